use std::time::Instant;

use hybrid_oracle::{commit, costs, prepare};
use hybrid_protocol::{ParserConfig, Sentence, TokenId, Transition};
use hybrid_state::{Mode, ParseState, StateError};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::ParserError;
use crate::scorer::{MarginLoss, Scorer};
use crate::select::choose;

/// Sentences between two progress lines.
const PROGRESS_EVERY: usize = 100;

/// Totals for one pass over the training data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    /// Sentences parsed to the end.
    pub sentences: usize,
    /// Sentences abandoned, either malformed or left without a valid action.
    pub skipped: usize,
    /// Sentences that used up their swap budget.
    pub swap_capped: usize,
    pub swaps: usize,
    /// Sum of `1 + wrong - valid` over all margin violations.
    pub loss: f32,
    /// Arc transitions taken.
    pub arcs: usize,
    /// Arcs with a wrong head or a wrong label.
    pub labeled_errors: usize,
    /// Arcs with a wrong head.
    pub attachment_errors: usize,
    /// Calls made to `Scorer::update`.
    pub updates: usize,
}

impl TrainReport {
    pub fn mean_loss(&self) -> f32 {
        self.loss / self.sentences.max(1) as f32
    }

    pub fn labeled_error_rate(&self) -> f32 {
        self.labeled_errors as f32 / self.arcs.max(1) as f32
    }

    pub fn attachment_error_rate(&self) -> f32 {
        self.attachment_errors as f32 / self.arcs.max(1) as f32
    }
}

/// Counters since the last progress line.
#[derive(Default)]
struct Window {
    loss: f32,
    arcs: usize,
    labeled_errors: usize,
    attachment_errors: usize,
}

enum Outcome {
    Parsed,
    Skipped,
}

/// Drives training episodes against a scorer.
pub struct Trainer<'a, S: Scorer> {
    scorer: &'a mut S,
    config: ParserConfig,
}

impl<'a, S: Scorer> Trainer<'a, S> {
    pub fn new(scorer: &'a mut S, config: &ParserConfig) -> Result<Self, ParserError> {
        config.validate()?;
        Ok(Self { scorer, config: config.clone() })
    }

    /// One epoch: shuffles the sentences with `rng`, parses each one under
    /// the oracle and feeds margin losses to the scorer in batches.
    pub fn train<R: Rng + ?Sized>(&mut self, sentences: &[Sentence], rng: &mut R) -> TrainReport {
        let mut order: Vec<usize> = (0..sentences.len()).collect();
        order.shuffle(rng);
        tracing::info!(sentences = sentences.len(), "training epoch");

        let mut report = TrainReport::default();
        let mut window = Window::default();
        let mut pending: Vec<MarginLoss<S::Handle>> = Vec::new();
        let mut started = Instant::now();

        for (seen, &index) in order.iter().enumerate() {
            let number = seen + 1;
            if number % PROGRESS_EVERY == 0 {
                let arcs = window.arcs.max(1) as f32;
                tracing::info!(
                    sentence = number,
                    loss = window.loss / arcs,
                    errors = window.attachment_errors as f32 / arcs,
                    labeled_errors = window.labeled_errors as f32 / arcs,
                    elapsed = ?started.elapsed(),
                    "training progress"
                );
                window = Window::default();
                started = Instant::now();
            }

            match self.episode(&sentences[index], rng, &mut pending, &mut window, &mut report) {
                Outcome::Parsed => report.sentences += 1,
                Outcome::Skipped => report.skipped += 1,
            }

            if pending.len() > self.config.error_batch {
                self.scorer.update(&pending);
                pending.clear();
                report.updates += 1;
            }
        }

        if !pending.is_empty() {
            self.scorer.update(&pending);
            report.updates += 1;
        }

        tracing::info!(
            sentences = report.sentences,
            skipped = report.skipped,
            loss = report.mean_loss(),
            "epoch finished"
        );
        report
    }

    fn episode<R: Rng + ?Sized>(
        &self,
        sentence: &Sentence,
        rng: &mut R,
        pending: &mut Vec<MarginLoss<S::Handle>>,
        window: &mut Window,
        report: &mut TrainReport,
    ) -> Outcome {
        let scorer: &S = &*self.scorer;
        let mut state = ParseState::new(sentence, scorer.relations(), &self.config, Mode::Train);
        if let Err(err) = prepare(&mut state) {
            tracing::warn!(error = %err, "skipping malformed training sentence");
            return Outcome::Skipped;
        }

        let mut capped = false;

        while !state.is_terminal() {
            if state.steps() >= state.step_bound() {
                tracing::warn!(steps = state.steps(), "training parse hit the step bound");
                return Outcome::Skipped;
            }
            if !capped && state.swap_budget_exhausted() {
                capped = true;
                report.swap_capped += 1;
                tracing::info!(budget = state.swap_budget(), "swap budget reached");
            }

            let taken = match step(scorer, &self.config, &mut state, rng) {
                Ok(Some(taken)) => taken,
                Ok(None) => {
                    tracing::warn!(steps = state.steps(), "no valid action, skipping sentence");
                    return Outcome::Skipped;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping sentence");
                    return Outcome::Skipped;
                }
            };

            if let Some((loss, hinge)) = taken.margin {
                report.loss += loss;
                window.loss += loss;
                pending.push(hinge);
            }

            if taken.transition.is_arc() {
                report.arcs += 1;
                window.arcs += 1;
                if let Some(child) = taken.s0.and_then(|id| state.node(id)) {
                    let wrong_head = child.pred_head != child.head;
                    if wrong_head || child.pred_relation != child.relation {
                        report.labeled_errors += 1;
                        window.labeled_errors += 1;
                    }
                    if wrong_head {
                        report.attachment_errors += 1;
                        window.attachment_errors += 1;
                    }
                }
            }
        }

        report.swaps += state.swaps();
        Outcome::Parsed
    }
}

/// A transition taken under the oracle.
pub(crate) struct Step<H> {
    pub transition: Transition,
    /// Top of the stack before the transition.
    pub s0: Option<TokenId>,
    pub margin: Option<(f32, MarginLoss<H>)>,
}

/// Scores `state`, picks an action against the oracle costs, commits the
/// oracle bookkeeping and applies it. `Ok(None)` when no action is valid.
pub(crate) fn step<S, R>(
    scorer: &S,
    config: &ParserConfig,
    state: &mut ParseState<'_>,
    rng: &mut R,
) -> Result<Option<Step<S::Handle>>, StateError>
where
    S: Scorer,
    R: Rng + ?Sized,
{
    let observation = state.observe(config.stack_window_k);
    let table = scorer.score(&observation);
    let candidates = table.candidates(observation.candidates);
    let costs = costs(state, observation.candidates);
    let s0 = state.s0();
    let gold = s0.and_then(|id| state.node(id)).and_then(|n| n.relation);

    let Some(decision) = choose(candidates, &costs, gold, config.uses_dynamic_oracle(), rng) else {
        return Ok(None);
    };

    let transition = decision.action.transition;
    commit(state, transition, costs.shift_case);
    state.apply(decision.action)?;
    Ok(Some(Step { transition, s0, margin: decision.margin }))
}
