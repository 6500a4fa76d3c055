use thiserror::Error;
use hybrid_protocol::{TokenId, Transition};

#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("{0} is not legal in the current state")]
    IllegalTransition(Transition),
    #[error("{0} needs a relation label")]
    MissingRelation(Transition),
    #[error("token {0} is not part of this sentence")]
    UnknownToken(TokenId),
}
