pub mod config;
pub mod error;
pub mod ids;
pub mod model;
pub mod relation;
pub mod transition;

// Re-export core types for convenience
pub use config::ParserConfig;
pub use error::{ConfigError, ProtocolError};
pub use ids::{RelationId, TokenId};
pub use model::*;
pub use relation::{Relations, UNKNOWN_RELATION};
pub use transition::{Action, Transition, TransitionSet};
