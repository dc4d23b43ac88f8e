use sanka_types::MemberId;
use thiserror::Error;

use crate::TicketId;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no member is signed in")]
    NoSession,

    #[error("unknown ticket: {0}")]
    UnknownTicket(TicketId),

    #[error("server view is for {got}, session is for {expected}")]
    MemberMismatch { expected: MemberId, got: MemberId },

    /// The server answered with an error body.
    #[error("{code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid server response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// The server's error code, when the server produced one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status == 503 || *status == 504,
            _ => false,
        }
    }
}
