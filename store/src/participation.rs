//! Participation storage trait.

use crate::StoreError;
use sanka_types::{ActivityId, MemberId, Points, Timestamp};
use serde::{Deserialize, Serialize};

/// Record of a member having joined an activity.
///
/// Existence implies the member was debited `cost` at `joined_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub member: MemberId,
    pub activity: ActivityId,
    pub cost: Points,
    pub joined_at: Timestamp,
}

/// Trait for participation storage.
///
/// Keys are `(member, activity)` pairs; each pair has at most one record.
pub trait ParticipationStore {
    /// Insert the record and add the activity to the member's joined set,
    /// atomically. `Duplicate` if the pair already exists.
    fn insert_participation(&self, participation: &Participation) -> Result<(), StoreError>;

    fn get_participation(
        &self,
        member: &MemberId,
        activity: ActivityId,
    ) -> Result<Option<Participation>, StoreError>;

    fn participations_of_member(&self, member: &MemberId) -> Result<Vec<Participation>, StoreError>;

    fn participants_of_activity(&self, activity: ActivityId)
        -> Result<Vec<Participation>, StoreError>;

    fn participation_count(&self) -> Result<u64, StoreError>;
}
