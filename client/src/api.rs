//! Server calls used by the client, and their HTTP implementation.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use sanka_store::{Activity, EvidenceUpload, VerificationRequest};
use sanka_types::{ActivityId, MemberId, MemberView, RequestId, VerificationKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ClientError;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A verification request as the member fills it in.
#[derive(Clone, Debug)]
pub struct VerificationForm {
    pub kind: VerificationKind,
    pub activity: Option<ActivityId>,
    pub reason: Option<String>,
    pub client_token: Option<String>,
    pub photo: Option<EvidenceUpload>,
}

/// Response to a verification submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitted {
    pub request: VerificationRequest,
    pub created: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// The server operations a client session drives.
pub trait PointsApi: Send + Sync {
    fn register<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<MemberView, ClientError>>;

    fn member<'a>(&'a self, member: &'a MemberId) -> BoxFuture<'a, Result<MemberView, ClientError>>;

    fn activities(&self) -> BoxFuture<'_, Result<Vec<Activity>, ClientError>>;

    fn join<'a>(
        &'a self,
        member: &'a MemberId,
        activity: ActivityId,
    ) -> BoxFuture<'a, Result<MemberView, ClientError>>;

    fn submit_verification<'a>(
        &'a self,
        member: &'a MemberId,
        form: &'a VerificationForm,
    ) -> BoxFuture<'a, Result<Submitted, ClientError>>;

    fn verification(&self, id: RequestId) -> BoxFuture<'_, Result<VerificationRequest, ClientError>>;
}

/// [`PointsApi`] over the service's HTTP interface.
#[derive(Clone)]
pub struct HttpPointsApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPointsApi {
    /// Target the API at `base_url` (e.g. `http://127.0.0.1:5003`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn post_form(
        &self,
        member: &MemberId,
        form: &VerificationForm,
    ) -> Result<Submitted, ClientError> {
        let mut body = Form::new()
            .text("member", member.to_string())
            .text("kind", form.kind.as_str());
        if let Some(activity) = form.activity {
            body = body.text("activity_id", activity.to_string());
        }
        if let Some(reason) = &form.reason {
            body = body.text("reason", reason.clone());
        }
        if let Some(token) = &form.client_token {
            body = body.text("client_token", token.clone());
        }
        if let Some(photo) = &form.photo {
            let part = Part::bytes(photo.bytes.clone())
                .file_name(photo.file_name.clone())
                .mime_str(&photo.content_type)
                .map_err(|e| ClientError::Transport(format!("photo content type: {e}")))?;
            body = body.part("photo", part);
        }

        let response = self
            .http
            .post(self.url("/verifications"))
            .multipart(body)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }
}

fn transport(e: reqwest::Error) -> ClientError {
    ClientError::Transport(e.to_string())
}

/// Decode a success body, or turn the server's error body into `Api`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(transport)?;
    if status.is_success() {
        return serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()));
    }
    match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(body) => Err(ClientError::Api {
            status: status.as_u16(),
            code: body.error,
            message: body.message,
        }),
        Err(_) => Err(ClientError::Api {
            status: status.as_u16(),
            code: fallback_code(status).to_string(),
            message: String::from_utf8_lossy(&bytes).into_owned(),
        }),
    }
}

fn fallback_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
        s if s.is_server_error() => "internal",
        _ => "invalid_request",
    }
}

impl PointsApi for HttpPointsApi {
    fn register<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<MemberView, ClientError>> {
        self.post_json("/members", json!({ "username": username }))
            .boxed()
    }

    fn member<'a>(&'a self, member: &'a MemberId) -> BoxFuture<'a, Result<MemberView, ClientError>> {
        async move { self.get(&format!("/members/{member}")).await }.boxed()
    }

    fn activities(&self) -> BoxFuture<'_, Result<Vec<Activity>, ClientError>> {
        self.get("/activities").boxed()
    }

    fn join<'a>(
        &'a self,
        member: &'a MemberId,
        activity: ActivityId,
    ) -> BoxFuture<'a, Result<MemberView, ClientError>> {
        async move {
            self.post_json(
                &format!("/activities/{activity}/join"),
                json!({ "member": member }),
            )
            .await
        }
        .boxed()
    }

    fn submit_verification<'a>(
        &'a self,
        member: &'a MemberId,
        form: &'a VerificationForm,
    ) -> BoxFuture<'a, Result<Submitted, ClientError>> {
        self.post_form(member, form).boxed()
    }

    fn verification(&self, id: RequestId) -> BoxFuture<'_, Result<VerificationRequest, ClientError>> {
        async move { self.get(&format!("/verifications/{id}")).await }.boxed()
    }
}
