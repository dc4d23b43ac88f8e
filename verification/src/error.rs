use sanka_ledger::LedgerError;
use sanka_types::{ActivityId, MemberId, RequestId, VerificationStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("an absence request needs a reason")]
    MissingReason,

    #[error("an absence request must name the activity")]
    MissingActivity,

    #[error("a photo is required as evidence")]
    MissingEvidence,

    #[error("invalid evidence: {0}")]
    InvalidEvidence(String),

    #[error("activity not found: {0}")]
    ActivityNotFound(ActivityId),

    #[error("member {member} has not joined activity {activity}")]
    NotJoined {
        member: MemberId,
        activity: ActivityId,
    },

    #[error("request {existing} for the same activity is already open")]
    AlreadySubmitted { existing: RequestId },

    #[error("verification request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("request {id} is already {status}")]
    AlreadyResolved {
        id: RequestId,
        status: VerificationStatus,
    },

    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    #[error("storage error: {0}")]
    Storage(#[from] sanka_store::StoreError),
}

impl From<LedgerError> for VerificationError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::MemberNotFound(m) => Self::MemberNotFound(m),
            LedgerError::Storage(e) => Self::Storage(e),
            other => Self::Ledger(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision service unreachable: {0}")]
    Unreachable(String),

    #[error("decision service request failed: {0}")]
    RequestFailed(String),

    #[error("invalid decision service response: {0}")]
    InvalidResponse(String),
}
