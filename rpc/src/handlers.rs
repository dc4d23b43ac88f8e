//! RPC request handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use sanka_catalog::ActivitySpec;
use sanka_ledger::AuditReport;
use sanka_node::PointsService;
use sanka_store::{Activity, EvidenceUpload, Participation, Transaction, VerificationRequest};
use sanka_types::{
    ActivityId, MemberId, MemberView, Outcome, RequestId, VerificationKind, VerificationStatus,
};
use sanka_verification::SubmitRequest;

use crate::dto::{
    BalanceResponse, HealthResponse, JoinRequest, ListVerificationsQuery, RegisterRequest,
    ResolutionResponse, ResolveRequest, SubmissionResponse,
};
use crate::error::{RpcError, RpcResult};

pub type AppState = Arc<PointsService>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> RpcResult<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| RpcError::InvalidRequest(e.body_text()))
}

fn activity_id(raw: &str) -> RpcResult<ActivityId> {
    raw.parse()
        .map_err(|e| RpcError::InvalidRequest(format!("activity id: {e}")))
}

fn request_id(raw: &str) -> RpcResult<RequestId> {
    raw.parse()
        .map_err(|e| RpcError::InvalidRequest(format!("request id: {e}")))
}

fn member_id(raw: &str) -> RpcResult<MemberId> {
    MemberId::parse(raw).map_err(|e| RpcError::Service(e.into()))
}

// ── Activities ───────────────────────────────────────────────────────────

pub async fn list_activities(State(svc): State<AppState>) -> RpcResult<Json<Vec<Activity>>> {
    Ok(Json(svc.list_activities().await?))
}

pub async fn create_activity(
    State(svc): State<AppState>,
    payload: Result<Json<ActivitySpec>, JsonRejection>,
) -> RpcResult<(StatusCode, Json<Activity>)> {
    let spec = body(payload)?;
    let activity = svc.create_activity(spec).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn get_activity(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> RpcResult<Json<Activity>> {
    Ok(Json(svc.get_activity(activity_id(&id)?).await?))
}

pub async fn participants(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> RpcResult<Json<Vec<Participation>>> {
    Ok(Json(svc.participants(activity_id(&id)?).await?))
}

pub async fn join_activity(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> RpcResult<Json<MemberView>> {
    let activity = activity_id(&id)?;
    let member = member_id(&body(payload)?.member)?;
    Ok(Json(svc.join_activity(&member, activity).await?))
}

// ── Members ──────────────────────────────────────────────────────────────

pub async fn register_member(
    State(svc): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> RpcResult<(StatusCode, Json<MemberView>)> {
    let req = body(payload)?;
    let view = svc.register_member(&req.username).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_member(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> RpcResult<Json<MemberView>> {
    Ok(Json(svc.get_member(&member_id(&id)?).await?))
}

pub async fn get_balance(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> RpcResult<Json<BalanceResponse>> {
    let member = member_id(&id)?;
    let balance = svc.get_balance(&member).await?;
    Ok(Json(BalanceResponse { member, balance }))
}

pub async fn transactions(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> RpcResult<Json<Vec<Transaction>>> {
    Ok(Json(svc.transactions(&member_id(&id)?).await?))
}

// ── Verification ─────────────────────────────────────────────────────────

/// `multipart/form-data` with text fields `member`, `kind`, `activity_id`,
/// `reason`, `client_token` and a file field `photo`.
pub async fn submit_verification(
    State(svc): State<AppState>,
    mut multipart: Multipart,
) -> RpcResult<(StatusCode, Json<SubmissionResponse>)> {
    let mut member = None;
    let mut kind = None;
    let mut activity = None;
    let mut reason = None;
    let mut client_token = None;
    let mut evidence = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "photo" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was chosen.
                if !(bytes.is_empty() && file_name.is_empty()) {
                    evidence = Some(EvidenceUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "member" => member = Some(member_id(&field.text().await?)?),
            "kind" => {
                let raw = field.text().await?;
                kind = Some(
                    raw.parse::<VerificationKind>()
                        .map_err(|e| RpcError::InvalidRequest(e.to_string()))?,
                );
            }
            "activity_id" => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    activity = Some(activity_id(&raw)?);
                }
            }
            "reason" => reason = Some(field.text().await?),
            "client_token" => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    client_token = Some(raw.trim().to_owned());
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }

    let member = member.ok_or_else(|| RpcError::InvalidRequest("missing field: member".into()))?;
    let kind = kind.ok_or_else(|| RpcError::InvalidRequest("missing field: kind".into()))?;
    let submission = svc
        .submit_verification(SubmitRequest {
            member,
            kind,
            activity,
            evidence,
            reason,
            client_token,
        })
        .await?;
    let status = if submission.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SubmissionResponse {
            request: submission.request,
            created: submission.created,
        }),
    ))
}

pub async fn list_verifications(
    State(svc): State<AppState>,
    Query(query): Query<ListVerificationsQuery>,
) -> RpcResult<Json<Vec<VerificationRequest>>> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<VerificationStatus>()
                .map_err(|e| RpcError::InvalidRequest(e.to_string()))?,
        ),
    };
    Ok(Json(svc.list_verifications(status).await?))
}

pub async fn get_verification(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> RpcResult<Json<VerificationRequest>> {
    Ok(Json(svc.get_verification(request_id(&id)?).await?))
}

/// The photo attached to a request, served with its recorded content type.
pub async fn verification_evidence(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> RpcResult<impl IntoResponse> {
    let request = svc.get_verification(request_id(&id)?).await?;
    let bytes = svc.evidence(&request.evidence.stored_name).await?;
    Ok((
        [(header::CONTENT_TYPE, request.evidence.content_type)],
        bytes,
    ))
}

pub async fn resolve_verification(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> RpcResult<Json<ResolutionResponse>> {
    let id = request_id(&id)?;
    let outcome = body(payload)?
        .outcome
        .parse::<Outcome>()
        .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
    let resolution = svc.resolve_verification(id, outcome).await?;
    Ok(Json(ResolutionResponse {
        request: resolution.request,
        member: resolution.member,
    }))
}

// ── Service ──────────────────────────────────────────────────────────────

pub async fn health(State(svc): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        decision_service: svc.decision_service().to_string(),
    })
}

pub async fn metrics(State(svc): State<AppState>) -> RpcResult<impl IntoResponse> {
    let text = svc.render_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    ))
}

pub async fn audit(State(svc): State<AppState>) -> RpcResult<Json<Vec<AuditReport>>> {
    Ok(Json(svc.audit().await?))
}
