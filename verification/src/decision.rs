//! The Decision Service seam.
//!
//! After a request is stored it is handed to a [`DecisionService`]. The
//! service either answers at once or defers; a deferred request stays
//! `pending` until someone resolves it through the API.

use std::sync::Mutex;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use sanka_store::VerificationRequest;
use sanka_types::{Outcome, RequestId};
use serde::Deserialize;
use tracing::info;

use crate::DecisionError;

/// Default timeout for webhook requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// What a decision service said about a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Resolve the request now with this outcome.
    Immediate(Outcome),
    /// The outcome will arrive later through `resolve`.
    Deferred,
}

/// A pluggable reviewer of verification requests.
pub trait DecisionService: Send + Sync {
    /// Human-readable name of this service.
    fn name(&self) -> &str;

    fn request_decision<'a>(
        &'a self,
        request: &'a VerificationRequest,
    ) -> BoxFuture<'a, Result<Decision, DecisionError>>;
}

/// Records each request to the log and defers; a human reviewer resolves it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDecisionService;

impl DecisionService for LogDecisionService {
    fn name(&self) -> &str {
        "log"
    }

    fn request_decision<'a>(
        &'a self,
        request: &'a VerificationRequest,
    ) -> BoxFuture<'a, Result<Decision, DecisionError>> {
        info!(
            request = %request.id,
            member = %request.member,
            kind = %request.kind,
            activity = ?request.activity.map(|a| a.get()),
            evidence = %request.evidence.stored_name,
            "verification awaiting review"
        );
        futures_util::future::ready(Ok(Decision::Deferred)).boxed()
    }
}

/// POSTs each request as JSON to a reviewer endpoint.
///
/// A 2xx response with a body of `{"outcome": "approved" | "rejected"}`
/// resolves the request immediately; any other 2xx body defers it.
pub struct WebhookDecisionService {
    url: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    #[serde(default)]
    outcome: Option<String>,
}

impl WebhookDecisionService {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            url: url.into(),
            http_client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, request: &VerificationRequest) -> Result<Decision, DecisionError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DecisionError::Unreachable(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    DecisionError::Unreachable(format!("connection failed: {e}"))
                } else {
                    DecisionError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(DecisionError::RequestFailed(format!(
                "HTTP status {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DecisionError::InvalidResponse(e.to_string()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Decision::Deferred);
        }
        let parsed: WebhookResponse = serde_json::from_slice(&body).map_err(|e| {
            DecisionError::InvalidResponse(format!("failed to parse decision response: {e}"))
        })?;
        match parsed.outcome {
            None => Ok(Decision::Deferred),
            Some(raw) => raw
                .parse::<Outcome>()
                .map(Decision::Immediate)
                .map_err(|e| DecisionError::InvalidResponse(e.to_string())),
        }
    }
}

impl DecisionService for WebhookDecisionService {
    fn name(&self) -> &str {
        "webhook"
    }

    fn request_decision<'a>(
        &'a self,
        request: &'a VerificationRequest,
    ) -> BoxFuture<'a, Result<Decision, DecisionError>> {
        self.post(request).boxed()
    }
}

/// Nullable decision service for tests.
///
/// Records every request it sees and answers with a scripted decision. It can
/// also be told to fail, or to never answer (to exercise timeouts).
pub struct NullDecisionService {
    script: Mutex<Script>,
    seen: Mutex<Vec<RequestId>>,
}

#[derive(Clone, Copy)]
enum Script {
    Answer(Decision),
    Fail,
    Hang,
}

impl NullDecisionService {
    /// Defers every request.
    pub fn new() -> Self {
        Self::answering(Decision::Deferred)
    }

    pub fn answering(decision: Decision) -> Self {
        Self {
            script: Mutex::new(Script::Answer(decision)),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails as if the service were down.
    pub fn failing() -> Self {
        let service = Self::new();
        service.set_script(Script::Fail);
        service
    }

    /// Calls never complete.
    pub fn hanging() -> Self {
        let service = Self::new();
        service.set_script(Script::Hang);
        service
    }

    pub fn answer(&self, decision: Decision) {
        self.set_script(Script::Answer(decision));
    }

    fn set_script(&self, script: Script) {
        *self.script.lock().unwrap_or_else(|e| e.into_inner()) = script;
    }

    /// Ids of every request handed to this service, in order.
    pub fn seen(&self) -> Vec<RequestId> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for NullDecisionService {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionService for NullDecisionService {
    fn name(&self) -> &str {
        "null"
    }

    fn request_decision<'a>(
        &'a self,
        request: &'a VerificationRequest,
    ) -> BoxFuture<'a, Result<Decision, DecisionError>> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.id);
        let script = *self.script.lock().unwrap_or_else(|e| e.into_inner());
        match script {
            Script::Answer(d) => futures_util::future::ready(Ok(d)).boxed(),
            Script::Fail => futures_util::future::ready(Err(DecisionError::Unreachable(
                "null decision service is failing".into(),
            )))
            .boxed(),
            Script::Hang => futures_util::future::pending::<Result<Decision, DecisionError>>().boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;
    use sanka_store::EvidenceRef;
    use sanka_types::{MemberId, Timestamp, VerificationKind, VerificationStatus};

    fn request() -> VerificationRequest {
        VerificationRequest {
            id: RequestId::new(3),
            member: MemberId::parse("noa").unwrap(),
            kind: VerificationKind::Attendance,
            activity: None,
            evidence: EvidenceRef {
                digest: "00".repeat(32),
                stored_name: "noa_19700101000000_p.jpg".into(),
                content_type: "image/jpeg".into(),
                size: 4,
            },
            reason: None,
            client_token: None,
            status: VerificationStatus::Pending,
            points_awarded: None,
            submitted_at: Timestamp::new(0),
            resolved_at: None,
        }
    }

    async fn serve(body: &'static str) -> String {
        let app = Router::new().route("/decide", post(move || async move { body }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/decide")
    }

    #[tokio::test]
    async fn log_service_defers() {
        let decision = LogDecisionService.request_decision(&request()).await.unwrap();
        assert_eq!(decision, Decision::Deferred);
    }

    #[tokio::test]
    async fn null_service_records_and_scripts() {
        let service = NullDecisionService::answering(Decision::Immediate(Outcome::Approved));
        let decision = service.request_decision(&request()).await.unwrap();
        assert_eq!(decision, Decision::Immediate(Outcome::Approved));
        assert_eq!(service.seen(), vec![RequestId::new(3)]);

        let failing = NullDecisionService::failing();
        assert!(failing.request_decision(&request()).await.is_err());
    }

    #[tokio::test]
    async fn null_service_can_hang() {
        let service = NullDecisionService::hanging();
        let req = request();
        let result = tokio::time::timeout(
            Duration::from_millis(20),
            service.request_decision(&req),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn webhook_reads_immediate_outcome() {
        let url = serve(r#"{"outcome":"rejected"}"#).await;
        let service = WebhookDecisionService::new(url);
        let decision = service.request_decision(&request()).await.unwrap();
        assert_eq!(decision, Decision::Immediate(Outcome::Rejected));
    }

    #[tokio::test]
    async fn webhook_empty_body_defers() {
        let url = serve("").await;
        let service = WebhookDecisionService::new(url);
        let decision = service.request_decision(&request()).await.unwrap();
        assert_eq!(decision, Decision::Deferred);
    }

    #[tokio::test]
    async fn webhook_garbage_is_invalid() {
        let url = serve("not json").await;
        let service = WebhookDecisionService::new(url);
        assert!(matches!(
            service.request_decision(&request()).await,
            Err(DecisionError::InvalidResponse(_))
        ));
    }
}
