//! Verification request storage trait.

use crate::{EvidenceRef, StoreError};
use sanka_types::{
    ActivityId, MemberId, Points, RequestId, Timestamp, VerificationKind, VerificationStatus,
};
use serde::{Deserialize, Serialize};

/// A member's request to have attendance or absence confirmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: RequestId,
    pub member: MemberId,
    pub kind: VerificationKind,
    /// Required for absence; attendance may omit it.
    #[serde(default)]
    pub activity: Option<ActivityId>,
    pub evidence: EvidenceRef,
    /// Free-text reason; always present for absence.
    #[serde(default)]
    pub reason: Option<String>,
    /// Caller-chosen token that makes a retried submission return this request.
    #[serde(default)]
    pub client_token: Option<String>,
    pub status: VerificationStatus,
    /// Points credited on approval.
    #[serde(default)]
    pub points_awarded: Option<Points>,
    pub submitted_at: Timestamp,
    #[serde(default)]
    pub resolved_at: Option<Timestamp>,
}

impl VerificationRequest {
    /// Pending or approved: blocks another request for the same subject.
    pub fn is_open(&self) -> bool {
        self.status != VerificationStatus::Rejected
    }
}

/// Trait for verification request storage.
pub trait VerificationStore {
    /// Reserve the next request id.
    fn next_request_id(&self) -> Result<RequestId, StoreError>;

    /// Store a new request; `Duplicate` if the id is taken.
    fn insert_request(&self, request: &VerificationRequest) -> Result<(), StoreError>;

    fn get_request(&self, id: RequestId) -> Result<VerificationRequest, StoreError>;

    /// Move a pending request to a terminal status.
    ///
    /// `Constraint` if the stored request is already terminal.
    fn finalize_request(
        &self,
        id: RequestId,
        status: VerificationStatus,
        points_awarded: Option<Points>,
        resolved_at: Timestamp,
    ) -> Result<VerificationRequest, StoreError>;

    fn find_by_client_token(
        &self,
        member: &MemberId,
        token: &str,
    ) -> Result<Option<VerificationRequest>, StoreError>;

    /// Requests of `member` about `activity` with the given kind, any status.
    fn requests_for_subject(
        &self,
        member: &MemberId,
        kind: VerificationKind,
        activity: ActivityId,
    ) -> Result<Vec<VerificationRequest>, StoreError>;

    /// All requests in submission order, optionally filtered by status.
    fn iter_requests(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<VerificationRequest>, StoreError>;
}
