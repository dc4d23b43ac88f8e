//! Member storage trait.

use crate::StoreError;
use sanka_types::{ActivityId, MemberId, MemberView, Points, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A registered member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    /// Cached balance. Always equal to the sum of the member's transaction deltas.
    pub balance: Points,
    /// Activities the member has joined.
    #[serde(default)]
    pub joined: BTreeSet<ActivityId>,
    pub created_at: Timestamp,
}

impl MemberRecord {
    /// A freshly registered member with nothing posted yet.
    pub fn new(id: MemberId, created_at: Timestamp) -> Self {
        Self {
            id,
            balance: Points::ZERO,
            joined: BTreeSet::new(),
            created_at,
        }
    }
}

impl From<MemberRecord> for MemberView {
    fn from(record: MemberRecord) -> Self {
        Self {
            member: record.id,
            balance: record.balance,
            joined: record.joined,
        }
    }
}

/// Trait for member storage operations.
pub trait MemberStore {
    fn get_member(&self, id: &MemberId) -> Result<MemberRecord, StoreError>;

    /// Insert a new member; `Duplicate` if the username is taken.
    fn insert_member(&self, record: &MemberRecord) -> Result<(), StoreError>;

    fn member_exists(&self, id: &MemberId) -> Result<bool, StoreError>;

    fn member_count(&self) -> Result<u64, StoreError>;

    /// All members, ordered by username.
    fn iter_members(&self) -> Result<Vec<MemberRecord>, StoreError>;
}
