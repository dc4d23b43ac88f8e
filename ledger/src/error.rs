use sanka_types::{DedupeKey, MemberId, Points};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("member already registered: {0}")]
    MemberExists(MemberId),

    #[error("insufficient balance for {member}: needed {needed}, available {available}")]
    InsufficientBalance {
        member: MemberId,
        needed: Points,
        available: Points,
    },

    #[error("dedupe key {key} was already used for a different posting")]
    KeyConflict { key: DedupeKey },

    #[error("amount {0} is too large to post")]
    AmountTooLarge(Points),

    #[error("storage error: {0}")]
    Storage(#[from] sanka_store::StoreError),
}
