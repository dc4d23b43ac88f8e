//! Request and response bodies.

use sanka_store::VerificationRequest;
use sanka_types::{MemberId, MemberView, Points};
use serde::{Deserialize, Serialize};

// ── Members ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub username: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BalanceResponse {
    pub member: MemberId,
    pub balance: Points,
}

// ── Join ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct JoinRequest {
    pub member: String,
}

// ── Verification ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct SubmissionResponse {
    pub request: VerificationRequest,
    /// `false` when a retried client token returned an existing request.
    pub created: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResolveRequest {
    /// `approved` or `rejected`.
    pub outcome: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResolutionResponse {
    pub request: VerificationRequest,
    /// Present when the request was approved.
    #[serde(default)]
    pub member: Option<MemberView>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListVerificationsQuery {
    #[serde(default)]
    pub status: Option<String>,
}

// ── Service ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub decision_service: String,
}
