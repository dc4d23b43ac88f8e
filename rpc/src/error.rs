//! RPC error types.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sanka_node::{ErrorClass, ServiceError};
use sanka_verification::VerificationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("server error: {0}")]
    Server(String),
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Service(e) => match e.class() {
                ErrorClass::Validation => StatusCode::BAD_REQUEST,
                ErrorClass::Conflict => StatusCode::CONFLICT,
                ErrorClass::Resource => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorClass::NotFound => StatusCode::NOT_FOUND,
                ErrorClass::Transient => match e {
                    ServiceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::SERVICE_UNAVAILABLE,
                },
                ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Multipart(e) => e.status(),
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Service(e) => e.code(),
            Self::InvalidRequest(_) => "invalid_request",
            Self::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "payload_too_large"
            }
            Self::Multipart(_) => "invalid_multipart",
            Self::Server(_) => "internal",
        }
    }
}

impl From<VerificationError> for RpcError {
    fn from(e: VerificationError) -> Self {
        Self::Service(e.into())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sanka_types::{ActivityId, MemberId};
    use sanka_verification::VerificationError;

    #[test]
    fn status_follows_error_class() {
        let cases: Vec<(RpcError, StatusCode)> = vec![
            (
                RpcError::from(VerificationError::MissingReason),
                StatusCode::BAD_REQUEST,
            ),
            (
                RpcError::from(VerificationError::NotJoined {
                    member: MemberId::parse("hana").unwrap(),
                    activity: ActivityId::new(1),
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                RpcError::Service(ServiceError::Timeout { operation: "join" }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                RpcError::InvalidRequest("bad id".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }
}
