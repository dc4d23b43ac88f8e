use sanka_catalog::CatalogError;
use sanka_ledger::LedgerError;
use sanka_types::{ActivityId, MemberId, Points};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParticipationError {
    #[error("activity not found: {0}")]
    ActivityNotFound(ActivityId),

    #[error("activity {0} is full")]
    ActivityFull(ActivityId),

    #[error("member {member} already joined activity {activity}")]
    AlreadyJoined {
        member: MemberId,
        activity: ActivityId,
    },

    #[error("insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance { needed: Points, available: Points },

    #[error("member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("join of {member} to {activity} failed and could not be compensated: {reason}")]
    CompensationFailed {
        member: MemberId,
        activity: ActivityId,
        reason: String,
    },

    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    #[error("catalog error: {0}")]
    Catalog(CatalogError),

    #[error("storage error: {0}")]
    Storage(#[from] sanka_store::StoreError),
}

impl From<LedgerError> for ParticipationError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::MemberNotFound(m) => Self::MemberNotFound(m),
            LedgerError::InsufficientBalance {
                needed, available, ..
            } => Self::InsufficientBalance { needed, available },
            LedgerError::Storage(e) => Self::Storage(e),
            other => Self::Ledger(other),
        }
    }
}

impl From<CatalogError> for ParticipationError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::ActivityNotFound(id) => Self::ActivityNotFound(id),
            CatalogError::ActivityFull(id) => Self::ActivityFull(id),
            CatalogError::Storage(e) => Self::Storage(e),
            other => Self::Catalog(other),
        }
    }
}
