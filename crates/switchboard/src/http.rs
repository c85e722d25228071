//! The HTTP surface: proxied inference routes, health, telemetry, and the
//! admin quota endpoints.

use crate::error::GatewayError;
use crate::middleware;
use crate::models;
use crate::pipeline::{self, Admission};
use crate::proxy::json::proxy_json;
use crate::proxy::sse::{proxy_stream, StreamContext};
use crate::state::Gateway;
use crate::tokens;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics::counter;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use switchboard_cache::{cacheable, cache_key};
use switchboard_upstream::Role;
use tracing::info;

/// Fixed completion-token estimates recorded for streams, which never
/// report real usage back through the gateway.
const STREAM_COMPLETION_ESTIMATE_CHAT: u64 = 500;
const STREAM_COMPLETION_ESTIMATE_TEXT2SQL: u64 = 200;

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/completions", post(completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/rerank", post(rerank))
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        .route("/metrics", get(metrics_endpoint))
        .route("/v1/models", get(model_catalogue))
        .route("/api/v1/models", get(model_catalogue))
        .route("/admin/quota/:tenant", get(admin_quota))
        .route("/admin/quotas", get(admin_quotas))
        .layer(axum::middleware::from_fn(middleware::observe))
        .with_state(gateway)
}

// ---------------------------------------------------------------------------
// Proxied inference routes
// ---------------------------------------------------------------------------

async fn chat_completions(
    State(gateway): State<Arc<Gateway>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let admission = pipeline::admit(&gateway, &headers, Some(peer.ip())).await?;
    let mut payload = parse_body(&body)?;
    let model = resolve_model(&mut payload);

    let prompt_tokens =
        tokens::estimate_prompt_tokens(payload.get("messages").unwrap_or(&Value::Null));
    let estimated = prompt_tokens
        + tokens::completion_budget(payload.get("max_tokens").and_then(Value::as_u64));
    gateway.quota.check(&admission.tenant, estimated)?;

    // One counter tick per admitted chat request, streamed or not.
    let snapshot = gateway.health.snapshot();
    let backend = snapshot.select(Role::Chat, gateway.next_chat_index())?;
    let endpoint = format!("{backend}/v1/chat/completions");

    if is_streaming(&payload) {
        let ctx = StreamContext {
            backend,
            endpoint,
            role: Role::Chat,
            tenant: admission.tenant.clone(),
            model,
            approx_tokens: prompt_tokens + STREAM_COMPLETION_ESTIMATE_CHAT,
        };
        return Ok(proxy_stream(gateway.clone(), ctx, payload, admission.permit));
    }

    dispatch_json(&gateway, &admission, &backend, &endpoint, payload, Role::Chat, &model, estimated)
        .await
}

async fn completions(
    State(gateway): State<Arc<Gateway>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let admission = pipeline::admit(&gateway, &headers, Some(peer.ip())).await?;
    let mut payload = parse_body(&body)?;
    let model = resolve_model(&mut payload);

    let prompt_tokens =
        tokens::estimate_prompt_tokens(payload.get("prompt").unwrap_or(&Value::Null));
    let estimated = prompt_tokens
        + tokens::completion_budget(payload.get("max_tokens").and_then(Value::as_u64));
    gateway.quota.check(&admission.tenant, estimated)?;

    let snapshot = gateway.health.snapshot();
    let backend = snapshot.select(Role::Text2Sql, 0)?;
    let endpoint = format!("{backend}/v1/completions");

    if is_streaming(&payload) {
        let ctx = StreamContext {
            backend,
            endpoint,
            role: Role::Text2Sql,
            tenant: admission.tenant.clone(),
            model,
            approx_tokens: prompt_tokens + STREAM_COMPLETION_ESTIMATE_TEXT2SQL,
        };
        return Ok(proxy_stream(gateway.clone(), ctx, payload, admission.permit));
    }

    dispatch_json(
        &gateway,
        &admission,
        &backend,
        &endpoint,
        payload,
        Role::Text2Sql,
        &model,
        estimated,
    )
    .await
}

async fn embeddings(
    State(gateway): State<Arc<Gateway>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let admission = pipeline::admit(&gateway, &headers, Some(peer.ip())).await?;
    let mut payload = parse_body(&body)?;
    let model = resolve_model(&mut payload);

    let estimated = tokens::estimate_prompt_tokens(payload.get("input").unwrap_or(&Value::Null));
    gateway.quota.check(&admission.tenant, estimated)?;

    let snapshot = gateway.health.snapshot();
    let backend = snapshot.select(Role::Embed, 0)?;
    let endpoint = format!("{backend}/v1/embeddings");

    dispatch_json(&gateway, &admission, &backend, &endpoint, payload, Role::Embed, &model, 0).await
}

async fn rerank(
    State(gateway): State<Arc<Gateway>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let admission = pipeline::admit(&gateway, &headers, Some(peer.ip())).await?;
    let mut payload = parse_body(&body)?;
    let model = resolve_model(&mut payload);

    gateway.quota.check(&admission.tenant, 0)?;

    let snapshot = gateway.health.snapshot();
    let backend = snapshot.select(Role::Rerank, 0)?;
    let endpoint = format!("{backend}/rerank");

    dispatch_json(&gateway, &admission, &backend, &endpoint, payload, Role::Rerank, &model, 0).await
}

/// The shared non-streaming tail: cache lookup, breaker-guarded dispatch,
/// cache fill, quota accounting.
#[allow(clippy::too_many_arguments)]
async fn dispatch_json(
    gateway: &Gateway,
    admission: &Admission,
    backend: &str,
    endpoint: &str,
    payload: Value,
    role: Role,
    model: &str,
    estimated_tokens: u64,
) -> Result<Response, GatewayError> {
    let key = cacheable(&payload).then(|| cache_key(&payload));

    if let Some(key) = &key {
        if let Some(cached) = gateway.cache.get(key) {
            info!(tenant = %admission.tenant, role = %role, "cache_hit");
            gateway.quota.record(&admission.tenant, 0);
            return Ok(Json(cached).into_response());
        }
    }

    let response_body = proxy_json(gateway, backend, endpoint, &payload, role).await?;

    // Only successful bodies reach this point, so nothing negative is ever
    // cached.
    if let Some(key) = key {
        gateway.cache.set(key, response_body.clone());
    }

    let spent = response_body
        .pointer("/usage/total_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(estimated_tokens);
    gateway.quota.record(&admission.tenant, spent);
    counter!(
        "gateway_tokens_processed_total",
        "tenant" => admission.tenant.clone(),
        "model" => model.to_string(),
        "role" => role.as_str()
    )
    .increment(spent);

    Ok(Json(response_body).into_response())
}

// ---------------------------------------------------------------------------
// Health and telemetry
// ---------------------------------------------------------------------------

async fn health(State(gateway): State<Arc<Gateway>>) -> Response {
    let snapshot = gateway.health.snapshot();
    let available = snapshot.all_roles_available();
    let status = if available {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "status": if available { "healthy" } else { "degraded" },
        "backends": &*snapshot,
    });
    (status, Json(body)).into_response()
}

async fn health_detailed(State(gateway): State<Arc<Gateway>>) -> Response {
    let snapshot = gateway.health.snapshot();
    let body = json!({
        "status": if snapshot.all_roles_available() { "healthy" } else { "degraded" },
        "backends": &*snapshot,
        "cache": gateway.cache.stats(),
    });
    Json(body).into_response()
}

async fn metrics_endpoint(State(gateway): State<Arc<Gateway>>) -> Response {
    let exposition = gateway
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        exposition,
    )
        .into_response()
}

async fn model_catalogue() -> Json<Value> {
    Json(models::catalogue())
}

// ---------------------------------------------------------------------------
// Admin surface
// ---------------------------------------------------------------------------

async fn admin_quota(
    State(gateway): State<Arc<Gateway>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    crate::auth::require_bearer(&headers, &gateway.settings.gateway_api_key)?;
    Ok(Json(gateway.quota.usage(&tenant)).into_response())
}

async fn admin_quotas(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    crate::auth::require_bearer(&headers, &gateway.settings.gateway_api_key)?;
    Ok(Json(gateway.quota.all_usage()).into_response())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_body(body: &Bytes) -> Result<Value, GatewayError> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|error| GatewayError::BadRequest(format!("invalid JSON body: {error}")))?;
    if !payload.is_object() {
        return Err(GatewayError::BadRequest(
            "request body must be a JSON object".to_string(),
        ));
    }
    Ok(payload)
}

fn is_streaming(payload: &Value) -> bool {
    payload
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Resolves the payload's model alias in place and returns the canonical
/// name used for accounting labels.
fn resolve_model(payload: &mut Value) -> String {
    let requested = payload
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("default");
    let canonical = models::resolve_alias(requested).to_string();
    payload["model"] = Value::String(canonical.clone());
    canonical
}
