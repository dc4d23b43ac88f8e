//! Activity storage trait.

use crate::StoreError;
use chrono::{NaiveDate, NaiveTime};
use sanka_types::{ActivityId, Points, Timestamp};
use serde::{Deserialize, Serialize};

/// A joinable, point-costing event with finite capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    /// Points charged to each member who joins.
    pub cost: Points,
    /// Capacity: the number of participants the activity takes.
    pub required_participants: u32,
    /// Participants so far. Never exceeds `required_participants`.
    pub current_participants: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub description: String,
    pub organizer: String,
    pub created_at: Timestamp,
}

impl Activity {
    pub fn is_full(&self) -> bool {
        self.current_participants >= self.required_participants
    }

    pub fn seats_left(&self) -> u32 {
        self.required_participants
            .saturating_sub(self.current_participants)
    }
}

/// A validated activity awaiting an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewActivity {
    pub name: String,
    pub cost: Points,
    pub required_participants: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub description: String,
    pub organizer: String,
}

/// Result of a compare-and-increment on an activity's participant count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeatUpdate {
    /// A seat was taken; carries the new participant count.
    Taken(u32),
    /// The activity was already at capacity; nothing changed.
    Full,
}

/// Trait for activity storage operations.
pub trait ActivityStore {
    /// Assign the next id and store the activity with zero participants.
    fn insert_activity(
        &self,
        activity: NewActivity,
        created_at: Timestamp,
    ) -> Result<Activity, StoreError>;

    fn get_activity(&self, id: ActivityId) -> Result<Activity, StoreError>;

    /// All activities in creation order.
    fn iter_activities(&self) -> Result<Vec<Activity>, StoreError>;

    /// Atomically take a seat if one is free.
    fn increment_participants(&self, id: ActivityId) -> Result<SeatUpdate, StoreError>;

    /// Give back a seat taken by a join that was subsequently compensated.
    fn release_participant(&self, id: ActivityId) -> Result<u32, StoreError>;
}
