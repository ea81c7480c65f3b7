//! Hub error types and their HTTP boundary mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Protocol and verification failures surfaced by the hub.
///
/// Every variant is recovered at the HTTP boundary; a bad request never
/// panics the process. Decode failures map to verification failures,
/// never to a pass.
#[derive(Debug, Error)]
pub enum HubError {
    /// Claimed public key is malformed or not 32 bytes
    #[error("pubkey is not a 32-byte key")]
    BadIdentity,

    /// Detached signature did not verify against the claimed key
    #[error("signature verify failed")]
    BadSignature,

    /// Subscription timestamp outside the replay window
    #[error("signature is expired")]
    Expired,

    /// Target identity has no active stream
    #[error("peer is not connected")]
    NotFound,

    /// Call is no longer awaited by any caller
    #[error("call is no longer awaited")]
    Gone,

    /// No response arrived within the call window
    #[error("call timed out waiting for a response")]
    Timeout,

    /// Per-identity rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimited,

    /// Request body exceeded the configured limit
    #[error("payload too large")]
    PayloadTooLarge,

    /// Broker infrastructure failure
    #[error("broker unavailable: {0}")]
    Broker(String),
}

/// Result type for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

/// Error response body returned alongside the status code
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl HubError {
    /// Default status code for this error.
    ///
    /// The subscription handler overrides `BadSignature` to 401; every
    /// other path uses this mapping as-is.
    pub fn status(&self) -> StatusCode {
        match self {
            HubError::BadIdentity | HubError::BadSignature | HubError::Expired => {
                StatusCode::BAD_REQUEST
            }
            HubError::NotFound => StatusCode::NOT_FOUND,
            HubError::Gone => StatusCode::GONE,
            HubError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            HubError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            HubError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            HubError::Broker(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short machine-readable reason for the response body
    fn tag(&self) -> &'static str {
        match self {
            HubError::BadIdentity => "bad_identity",
            HubError::BadSignature => "bad_signature",
            HubError::Expired => "expired",
            HubError::NotFound => "not_found",
            HubError::Gone => "gone",
            HubError::Timeout => "timeout",
            HubError::RateLimited => "rate_limited",
            HubError::PayloadTooLarge => "payload_too_large",
            HubError::Broker(_) => "broker_unavailable",
        }
    }

    /// Build a response with an explicit status code
    pub fn respond(&self, status: StatusCode) -> Response {
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.tag(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status();
        self.respond(status)
    }
}
