//! The gateway's error surface.
//!
//! Admission rejections and backend failures all funnel into
//! [`GatewayError`], whose `IntoResponse` impl owns the status-code and
//! header mapping. Failures inside an SSE stream never reach this type:
//! headers are already on the wire, so they are encoded as error frames by
//! the stream proxy instead.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use switchboard_breaker::CircuitOpen;
use switchboard_gate::GateError;
use switchboard_quota::QuotaDenial;
use switchboard_ratelimit::RateLimitError;
use switchboard_upstream::NoHealthyBackend;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Missing Bearer token")]
    AuthMissing,

    #[error("Invalid API key")]
    AuthInvalid,

    #[error("Rate limit exceeded")]
    RateLimited { limit: usize },

    #[error("Too many concurrent requests")]
    QueueTimeout,

    #[error(transparent)]
    QuotaExceeded(#[from] QuotaDenial),

    #[error(transparent)]
    NoHealthyBackend(#[from] NoHealthyBackend),

    #[error("Backend temporarily unavailable")]
    CircuitOpen(#[from] CircuitOpen),

    #[error("Backend request timed out")]
    GatewayTimeout,

    #[error("Backend connection failed")]
    BadGateway,

    /// A backend answered with a non-2xx status on the JSON path; both the
    /// status and body pass through to the client.
    #[error("upstream returned {status}")]
    Upstream { status: StatusCode, body: Value },

    #[error("{0}")]
    BadRequest(String),
}

impl From<RateLimitError> for GatewayError {
    fn from(err: RateLimitError) -> Self {
        let RateLimitError::Exceeded { limit } = err;
        GatewayError::RateLimited { limit }
    }
}

impl From<GateError> for GatewayError {
    fn from(_: GateError) -> Self {
        GatewayError::QueueTimeout
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::AuthMissing => StatusCode::UNAUTHORIZED,
            GatewayError::AuthInvalid => StatusCode::FORBIDDEN,
            GatewayError::RateLimited { .. }
            | GatewayError::QueueTimeout
            | GatewayError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::NoHealthyBackend(_) | GatewayError::CircuitOpen(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::BadGateway => StatusCode::BAD_GATEWAY,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        let mut response = match &self {
            GatewayError::Upstream { body, .. } => Json(body.clone()).into_response(),
            other => Json(json!({ "detail": other.to_string() })).into_response(),
        };
        *response.status_mut() = status;

        let headers = response.headers_mut();
        match &self {
            GatewayError::RateLimited { limit } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
                if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                    headers.insert("x-ratelimit-limit", value);
                }
            }
            GatewayError::QueueTimeout => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from_static("5"));
            }
            GatewayError::QuotaExceeded(denial) => {
                if let Ok(value) = HeaderValue::from_str(&denial.reset_at.to_rfc3339()) {
                    headers.insert("x-quota-reset", value);
                }
            }
            _ => {}
        }

        response
    }
}
