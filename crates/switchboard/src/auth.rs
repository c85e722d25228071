//! Gateway authentication: a single shared bearer token.

use crate::error::GatewayError;
use axum::http::{header, HeaderMap};

/// 401 when the header is absent or not a bearer token, 403 when the token
/// does not match.
pub fn require_bearer(headers: &HeaderMap, expected: &str) -> Result<(), GatewayError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::AuthMissing)?;

    let token = authorization
        .strip_prefix("Bearer ")
        .ok_or(GatewayError::AuthMissing)?
        .trim();

    if token != expected {
        return Err(GatewayError::AuthInvalid);
    }
    Ok(())
}
