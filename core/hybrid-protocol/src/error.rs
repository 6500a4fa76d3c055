use thiserror::Error;
use crate::ids::TokenId;

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("token ids must be contiguous: expected {expected}, found {found}")]
    NonContiguousId { expected: TokenId, found: TokenId },
    #[error("token {token} points at unknown head {head}")]
    UnknownHead { token: TokenId, head: TokenId },
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("enable at least one of the head, child or descendant representations")]
    NoRepresentation,
    #[error("stack window must cover at least one element")]
    EmptyStackWindow,
}
