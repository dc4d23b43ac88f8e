//! Member-facing projection of ledger state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{ActivityId, MemberId, Points};

/// A member's balance and joined activities, as returned to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub member: MemberId,
    pub balance: Points,
    #[serde(default)]
    pub joined: BTreeSet<ActivityId>,
}

impl MemberView {
    pub fn has_joined(&self, activity: ActivityId) -> bool {
        self.joined.contains(&activity)
    }
}
