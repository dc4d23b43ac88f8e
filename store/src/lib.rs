//! Abstract storage traits for the sanka points ledger.
//!
//! Every storage backend (JSON files, in-memory for testing) implements
//! these traits. The rest of the codebase depends only on the traits.
//!
//! Operations that must change two records together (a ledger posting and the
//! member's cached balance, a participation and the member's joined set) are
//! single trait methods so each backend can apply them atomically.

pub mod activity;
pub mod error;
pub mod evidence;
pub mod member;
pub mod memory;
pub mod participation;
pub mod transaction;
pub mod verification;

pub use activity::{Activity, ActivityStore, NewActivity, SeatUpdate};
pub use error::StoreError;
pub use evidence::{evidence_file_name, EvidenceRef, EvidenceStore, EvidenceUpload};
pub use member::{MemberRecord, MemberStore};
pub use memory::{Snapshot, Tables};
pub use participation::{Participation, ParticipationStore};
pub use transaction::{Transaction, TransactionStore};
pub use verification::{VerificationRequest, VerificationStore};

/// Everything the services need from a backend.
pub trait Store:
    MemberStore
    + ActivityStore
    + ParticipationStore
    + TransactionStore
    + VerificationStore
    + EvidenceStore
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: MemberStore
        + ActivityStore
        + ParticipationStore
        + TransactionStore
        + VerificationStore
        + EvidenceStore
        + Send
        + Sync
{
}
