use hybrid_oracle::Costs;
use hybrid_protocol::{Action, RelationId, Transition};
use rand::Rng;

use crate::scorer::{Candidate, MarginLoss};

/// Margin the valid action must clear before it is preferred without a coin toss.
const MARGIN: f32 = 1.0;
/// Chance of following the best wrong action when it outscores the valid one.
const EXPLORE_BELOW: f64 = 0.1;

/// Highest scoring candidate. Only a strictly greater score replaces the
/// current best, so ties go to the earlier candidate.
pub fn greedy<H>(candidates: impl IntoIterator<Item = Candidate<H>>) -> Option<Candidate<H>> {
    let mut best: Option<Candidate<H>> = None;
    for candidate in candidates {
        match &best {
            Some(current) if !(candidate.action.score > current.action.score) => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Outcome of one training step.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision<H> {
    pub action: Action,
    /// Scalar loss and hinge term, present when the valid action did not
    /// beat the wrong one by the margin.
    pub margin: Option<(f32, MarginLoss<H>)>,
}

/// Training-time choice between the best zero-cost action and the best
/// costly one. Returns `None` when no candidate is valid.
///
/// `gold` is the gold relation of s0; arcs are only valid with that label.
/// With `explore` off the valid action is always followed.
pub fn choose<H: Clone, R: Rng + ?Sized>(
    candidates: Vec<Candidate<H>>,
    costs: &Costs,
    gold: Option<RelationId>,
    explore: bool,
    rng: &mut R,
) -> Option<Decision<H>> {
    let (valid, wrong): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|c| {
        let transition = c.action.transition;
        costs.is_free(transition) && (!transition.is_arc() || c.action.relation == gold)
    });

    let best_valid = greedy(valid)?;
    // An absent wrong candidate behaves like one scored at negative infinity.
    let best_wrong = greedy(wrong);
    let valid_score = best_valid.action.score;
    let wrong_score = best_wrong.as_ref().map_or(f32::NEG_INFINITY, |w| w.action.score);

    let follow_valid = costs.swap_forced()
        || best_wrong.as_ref().map_or(false, |w| w.action.transition == Transition::Swap)
        || !explore
        || valid_score - wrong_score > MARGIN
        || (valid_score > wrong_score && rng.gen::<f64>() > EXPLORE_BELOW);

    let margin = match &best_wrong {
        Some(wrong) if valid_score < wrong_score + MARGIN => Some((
            MARGIN + wrong_score - valid_score,
            MarginLoss { wrong: wrong.handle.clone(), valid: best_valid.handle.clone() },
        )),
        _ => None,
    };

    let action = match best_wrong {
        Some(wrong) if !follow_valid => wrong.action,
        _ => best_valid.action,
    };
    Some(Decision { action, margin })
}
