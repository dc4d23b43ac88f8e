//! Submission and resolution of verification requests.

use std::sync::Arc;

use sanka_ledger::PointsLedger;
use sanka_store::{EvidenceUpload, Store, StoreError, VerificationRequest};
use sanka_types::{
    ActivityId, Clock, DedupeKey, MemberId, MemberView, Outcome, Points, PointsParams, RequestId,
    TransactionReason, VerificationKind, VerificationStatus,
};
use tracing::{debug, info, warn};

use crate::{validate_evidence, VerificationError};

/// Everything a member sends with a verification request.
#[derive(Clone, Debug)]
pub struct SubmitRequest {
    pub member: MemberId,
    pub kind: VerificationKind,
    pub activity: Option<ActivityId>,
    pub evidence: Option<EvidenceUpload>,
    pub reason: Option<String>,
    /// Makes a retried submission return the request created the first time.
    pub client_token: Option<String>,
}

/// Outcome of `submit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub request: VerificationRequest,
    /// `false` when a retried client token returned an existing request.
    pub created: bool,
}

/// Outcome of `resolve`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub request: VerificationRequest,
    /// The member's updated view, present when the request was approved.
    pub member: Option<MemberView>,
}

pub struct VerificationWorkflow {
    store: Arc<dyn Store>,
    ledger: Arc<PointsLedger>,
    clock: Arc<dyn Clock>,
    params: PointsParams,
}

impl VerificationWorkflow {
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<PointsLedger>,
        clock: Arc<dyn Clock>,
        params: PointsParams,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            params,
        }
    }

    /// Validate and store a new `pending` request.
    ///
    /// Callers serialize submissions per member; the duplicate checks and the
    /// insert are not atomic on their own.
    pub fn submit(&self, req: SubmitRequest) -> Result<Submission, VerificationError> {
        if !self.store.member_exists(&req.member)? {
            return Err(VerificationError::MemberNotFound(req.member));
        }

        let token = req
            .client_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(token) = token {
            if let Some(existing) = self.store.find_by_client_token(&req.member, token)? {
                debug!(request = %existing.id, member = %req.member, "replayed submission");
                return Ok(Submission {
                    request: existing,
                    created: false,
                });
            }
        }

        let reason = req
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        if req.kind.requires_reason() && reason.is_none() {
            return Err(VerificationError::MissingReason);
        }
        if req.kind.requires_activity() && req.activity.is_none() {
            return Err(VerificationError::MissingActivity);
        }
        let upload = validate_evidence(req.evidence.as_ref(), self.params.max_evidence_bytes)?;

        if let Some(activity) = req.activity {
            match self.store.get_activity(activity) {
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => {
                    return Err(VerificationError::ActivityNotFound(activity))
                }
                Err(e) => return Err(e.into()),
            }
            if req.kind == VerificationKind::Absence
                && self
                    .store
                    .get_participation(&req.member, activity)?
                    .is_none()
            {
                return Err(VerificationError::NotJoined {
                    member: req.member,
                    activity,
                });
            }
            let open = self
                .store
                .requests_for_subject(&req.member, req.kind, activity)?
                .into_iter()
                .find(VerificationRequest::is_open);
            if let Some(open) = open {
                return Err(VerificationError::AlreadySubmitted { existing: open.id });
            }
        }

        let now = self.clock.now();
        let evidence = self.store.save_evidence(&req.member, upload, now)?;
        let request = VerificationRequest {
            id: self.store.next_request_id()?,
            member: req.member,
            kind: req.kind,
            activity: req.activity,
            evidence,
            reason,
            client_token: token.map(str::to_string),
            status: VerificationStatus::Pending,
            points_awarded: None,
            submitted_at: now,
            resolved_at: None,
        };
        self.store.insert_request(&request)?;
        info!(
            request = %request.id,
            member = %request.member,
            kind = %request.kind,
            evidence_bytes = request.evidence.size,
            "verification submitted"
        );
        Ok(Submission {
            request,
            created: true,
        })
    }

    /// Move a pending request to its terminal status.
    ///
    /// An approval credits the member before the status is written, keyed by
    /// the request id. If a previous attempt credited but did not record the
    /// status, the request is finalized as approved whatever `outcome` says.
    pub fn resolve(
        &self,
        id: RequestId,
        outcome: Outcome,
    ) -> Result<Resolution, VerificationError> {
        let request = self.request(id)?;
        if request.status.is_terminal() {
            return Err(VerificationError::AlreadyResolved {
                id,
                status: request.status,
            });
        }

        let key = DedupeKey::verification(id);
        let outcome = if outcome == Outcome::Rejected && self.ledger.is_applied(&key)? {
            warn!(request = %id, "credit already posted, finalizing as approved");
            Outcome::Approved
        } else {
            outcome
        };

        let awarded = match outcome {
            Outcome::Approved => {
                let award = self.award_for(&request)?;
                self.ledger.credit(
                    &request.member,
                    award,
                    key,
                    TransactionReason::from(request.kind),
                )?;
                Some(award)
            }
            Outcome::Rejected => None,
        };

        let resolved = match self.store.finalize_request(
            id,
            outcome.status(),
            awarded,
            self.clock.now(),
        ) {
            Ok(r) => r,
            Err(StoreError::Constraint(_)) => {
                let current = self.request(id)?;
                return Err(VerificationError::AlreadyResolved {
                    id,
                    status: current.status,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let member = match outcome {
            Outcome::Approved => Some(self.store.get_member(&resolved.member)?.into()),
            Outcome::Rejected => None,
        };
        info!(
            request = %id,
            member = %resolved.member,
            status = %resolved.status,
            awarded = ?awarded.map(|p| p.raw()),
            "verification resolved"
        );
        Ok(Resolution {
            request: resolved,
            member,
        })
    }

    fn award_for(&self, request: &VerificationRequest) -> Result<Points, VerificationError> {
        match request.kind {
            VerificationKind::Attendance => Ok(self.params.attendance_award),
            VerificationKind::Absence => {
                let activity = request
                    .activity
                    .ok_or(VerificationError::MissingActivity)?;
                self.store
                    .get_participation(&request.member, activity)?
                    .map(|p| p.cost)
                    .ok_or_else(|| VerificationError::NotJoined {
                        member: request.member.clone(),
                        activity,
                    })
            }
        }
    }

    pub fn request(&self, id: RequestId) -> Result<VerificationRequest, VerificationError> {
        self.store.get_request(id).map_err(|e| match e {
            StoreError::NotFound(_) => VerificationError::RequestNotFound(id),
            other => other.into(),
        })
    }

    /// All requests in submission order, optionally only those with `status`.
    pub fn list(
        &self,
        status: Option<VerificationStatus>,
    ) -> Result<Vec<VerificationRequest>, VerificationError> {
        Ok(self.store.iter_requests(status)?)
    }
}
