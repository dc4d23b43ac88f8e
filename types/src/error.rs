//! Errors raised while constructing fundamental types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid member id: {0}")]
    InvalidMemberId(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unknown verification kind: {0}")]
    UnknownKind(String),

    #[error("unknown outcome: {0}")]
    UnknownOutcome(String),

    #[error("unknown status: {0}")]
    UnknownStatus(String),
}
