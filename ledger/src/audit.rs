//! Balance audits against the transaction log.

use sanka_types::{MemberId, Points};
use serde::Serialize;

/// Cached balance of one member compared with the sum of their log entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub member: MemberId,
    pub cached: Points,
    /// Sum of the member's transaction deltas.
    pub derived: i128,
    pub transactions: usize,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.derived == self.cached.raw() as i128
    }
}
