use hybrid_protocol::{ParserConfig, Sentence};
use hybrid_state::{Mode, ParseState};

use crate::error::ParserError;
use crate::scorer::Scorer;
use crate::select::greedy;

/// A parsed copy of an input sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub sentence: Sentence,
    pub swaps: usize,
    /// The swap budget ran out before the parse finished.
    pub swap_capped: bool,
}

/// Greedily parses `sentence`, returning a copy with predicted heads and labels.
pub fn parse<S: Scorer>(
    scorer: &S,
    config: &ParserConfig,
    sentence: &Sentence,
) -> Result<Parsed, ParserError> {
    let relations = scorer.relations();
    let mut state = ParseState::new(sentence, relations, config, Mode::Predict);
    let mut swap_capped = false;

    while !state.is_terminal() {
        if state.steps() >= state.step_bound() {
            return Err(ParserError::StepLimit { steps: state.steps() });
        }
        if !swap_capped && state.swap_budget_exhausted() {
            swap_capped = true;
        }

        let observation = state.observe(config.stack_window_k);
        let table = scorer.score(&observation);
        let best = greedy(table.candidates(observation.candidates))
            .ok_or(ParserError::NoCandidate { steps: state.steps() })?;
        state.apply(best.action)?;
    }

    let mut out = sentence.clone();
    out.clear_predictions();
    state.write_predictions(&mut out, relations);
    Ok(Parsed { sentence: out, swaps: state.swaps(), swap_capped })
}

/// Lazily parses a sequence of sentences, one output per input, in order.
/// Inputs are never modified. Re-create the predictor to start over.
pub struct Predictor<'a, S, I> {
    scorer: &'a S,
    config: &'a ParserConfig,
    sentences: I,
    parsed: usize,
    swap_capped: usize,
}

impl<'a, S, I> Predictor<'a, S, I>
where
    S: Scorer,
    I: Iterator<Item = &'a Sentence>,
{
    pub fn new(
        scorer: &'a S,
        config: &'a ParserConfig,
        sentences: impl IntoIterator<Item = &'a Sentence, IntoIter = I>,
    ) -> Self {
        Self { scorer, config, sentences: sentences.into_iter(), parsed: 0, swap_capped: 0 }
    }

    /// Sentences whose parse ran out of swap budget so far.
    pub fn swap_capped(&self) -> usize {
        self.swap_capped
    }

    pub fn parsed(&self) -> usize {
        self.parsed
    }
}

impl<'a, S, I> Iterator for Predictor<'a, S, I>
where
    S: Scorer,
    I: Iterator<Item = &'a Sentence>,
{
    type Item = Result<Sentence, ParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        let sentence = self.sentences.next()?;
        self.parsed += 1;
        Some(parse(self.scorer, self.config, sentence).map(|parsed| {
            if parsed.swap_capped {
                self.swap_capped += 1;
                tracing::info!(
                    capped = self.swap_capped,
                    parsed = self.parsed,
                    "swap budget reached"
                );
            }
            parsed.sentence
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.sentences.size_hint()
    }
}
