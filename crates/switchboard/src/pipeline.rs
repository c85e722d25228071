//! The fixed admission sequence every proxied route runs before touching
//! a backend: tenant key → rate limit → authentication → concurrency gate.
//!
//! The remaining steps (body parsing, alias resolution, token estimation,
//! quota, backend selection) live with the route handlers because their
//! inputs differ per route; the ordering is pinned by the handlers calling
//! [`admit`] first.

use crate::auth;
use crate::error::GatewayError;
use crate::state::Gateway;
use crate::tenant;
use axum::http::HeaderMap;
use std::net::IpAddr;
use switchboard_gate::GatePermit;

/// An admitted request: the tenant key plus the held concurrency slot.
pub struct Admission {
    pub tenant: String,
    pub permit: GatePermit,
}

pub async fn admit(
    gateway: &Gateway,
    headers: &HeaderMap,
    peer: Option<IpAddr>,
) -> Result<Admission, GatewayError> {
    let tenant = tenant::client_key(headers, peer);

    gateway.limiter.check(&tenant)?;
    auth::require_bearer(headers, &gateway.settings.gateway_api_key)?;
    let permit = gateway.gate.admit(&tenant).await?;

    Ok(Admission { tenant, permit })
}
