use thiserror::Error;
use hybrid_protocol::ProtocolError;

#[derive(Debug, Error)]
pub enum ConlluError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("sentence ending at line {line}: {source}")]
    Sentence {
        line: usize,
        #[source]
        source: ProtocolError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
