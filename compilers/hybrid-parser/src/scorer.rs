use hybrid_protocol::{Action, RelationId, Relations, Transition, TransitionSet};
use hybrid_state::Observation;

/// One scored output. The handle lets the scorer find its way back to the
/// parameters behind the score during `update`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<H> {
    pub score: f32,
    pub handle: H,
}

impl<H> Scored<H> {
    pub fn new(score: f32, handle: H) -> Self {
        Self { score, handle }
    }
}

/// Scores for every action in a state, whether legal or not.
/// `left_arc[j]` and `right_arc[j]` belong to relation `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable<H> {
    pub left_arc: Vec<Scored<H>>,
    pub right_arc: Vec<Scored<H>>,
    pub shift: Scored<H>,
    pub swap: Scored<H>,
}

/// A hinge term: push `valid` up and `wrong` down.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginLoss<H> {
    pub wrong: H,
    pub valid: H,
}

/// A fully specified action together with the handle of its score.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<H> {
    pub action: Action,
    pub handle: H,
}

impl<H: Clone> ScoreTable<H> {
    /// Expands the table into candidates for the transitions in `allowed`:
    /// LEFT-ARC per relation, RIGHT-ARC per relation, SHIFT, SWAP.
    pub fn candidates(&self, allowed: TransitionSet) -> Vec<Candidate<H>> {
        let mut out = Vec::new();
        for transition in allowed.transitions() {
            match transition {
                Transition::LeftArc | Transition::RightArc => {
                    let row = if transition == Transition::LeftArc {
                        &self.left_arc
                    } else {
                        &self.right_arc
                    };
                    out.extend(row.iter().enumerate().map(|(j, scored)| Candidate {
                        action: Action::new(transition, Some(RelationId(j as u32)), scored.score),
                        handle: scored.handle.clone(),
                    }));
                }
                Transition::Shift => out.push(Candidate {
                    action: Action::new(transition, None, self.shift.score),
                    handle: self.shift.handle.clone(),
                }),
                Transition::Swap => out.push(Candidate {
                    action: Action::new(transition, None, self.swap.score),
                    handle: self.swap.handle.clone(),
                }),
            }
        }
        out
    }
}

/// Turns observations into action scores and learns from margin losses.
///
/// `score` only reads parameters; `update` is called between sentences.
pub trait Scorer {
    type Handle: Clone;

    /// Label vocabulary, in the order the score table lists arc scores.
    fn relations(&self) -> &Relations;

    fn score(&self, observation: &Observation<'_>) -> ScoreTable<Self::Handle>;

    fn update(&mut self, losses: &[MarginLoss<Self::Handle>]);
}
