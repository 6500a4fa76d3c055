use thiserror::Error;
use hybrid_protocol::TokenId;

#[derive(Debug, Error, PartialEq)]
pub enum OracleError {
    #[error("token {0} has no gold head")]
    Unannotated(TokenId),
    #[error("token {token} points at head {head}, which is not in the sentence")]
    UnknownHead { token: TokenId, head: TokenId },
    #[error("gold tree contains a cycle")]
    Cycle,
    #[error("token {0} is not reachable from the root")]
    Unreachable(TokenId),
}
