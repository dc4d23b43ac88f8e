//! Economic parameters of the points system.

use crate::Points;
use serde::{Deserialize, Serialize};

/// Maximum evidence attachment size accepted by default (16 MiB).
pub const DEFAULT_MAX_EVIDENCE_BYTES: usize = 16 * 1024 * 1024;

/// Tunable values shared by the ledger, tracker, and verification workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsParams {
    /// Balance granted to a member at registration.
    pub starting_balance: Points,

    /// Fixed award for an approved attendance verification.
    pub attendance_award: Points,

    /// Largest evidence attachment accepted, in bytes.
    pub max_evidence_bytes: usize,
}

impl Default for PointsParams {
    fn default() -> Self {
        Self {
            starting_balance: Points::new(20),
            attendance_award: Points::new(10),
            max_evidence_bytes: DEFAULT_MAX_EVIDENCE_BYTES,
        }
    }
}
