pub mod error;
pub mod linear;
pub mod predict;
pub mod scorer;
pub mod select;
pub mod train;

pub use error::{ParserError, ScorerError};
pub use linear::{FeatureRow, LinearHandle, LinearScorer, ScorerSnapshot};
pub use predict::{parse, Parsed, Predictor};
pub use scorer::{Candidate, MarginLoss, ScoreTable, Scored, Scorer};
pub use train::{TrainReport, Trainer};
