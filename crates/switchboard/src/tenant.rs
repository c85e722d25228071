//! Tenant identification.
//!
//! A tenant is the unit of rate, concurrency, and quota accounting: the
//! first hop of `X-Forwarded-For` when the gateway sits behind an edge
//! proxy, else the peer address, else `"unknown"`.

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

pub fn client_key(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_hop) = forwarded.split(',').next() {
            let first_hop = first_hop.trim();
            if !first_hop.is_empty() {
                return first_hop.to_string();
            }
        }
    }
    match peer {
        Some(ip) => ip.to_string(),
        None => "unknown".to_string(),
    }
}

/// Variant for middleware, which sees the raw request rather than
/// extractors.
pub fn client_key_from_request<B>(request: &axum::http::Request<B>) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    client_key(request.headers(), peer)
}
