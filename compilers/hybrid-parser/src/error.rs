use thiserror::Error;
use hybrid_protocol::ConfigError;
use hybrid_state::StateError;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("no candidate transition after {steps} steps")]
    NoCandidate { steps: usize },
    #[error("parse did not terminate within {steps} steps")]
    StepLimit { steps: usize },
}

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("model archive: {0}")]
    Archive(String),
    #[error("feature `{feature}` has {found} weights, expected {expected}")]
    Width {
        feature: String,
        expected: usize,
        found: usize,
    },
}
