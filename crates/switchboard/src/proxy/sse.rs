//! The streaming half of the proxy.
//!
//! Opens a streaming POST against the selected backend, reframes its
//! output line by line through [`transform`](super::transform), and ships
//! the result to the client as a server-sent-event body. Failures after
//! the response headers have gone out can no longer become HTTP errors, so
//! every failure mode collapses to one error frame followed by
//! `data: [DONE]\n\n` on a 200 stream.
//!
//! The gate permit rides inside the body stream: if the client disconnects
//! mid-stream the body is dropped, the upstream read is cancelled, and the
//! permit releases the tenant's slot on the way down.

use crate::proxy::transform::{error_frame, transform_line, upstream_error_frame, LineAction, DONE_FRAME};
use crate::redact;
use crate::state::Gateway;
use async_stream::stream;
use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use futures::StreamExt;
use metrics::{counter, histogram};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use switchboard_gate::GatePermit;
use switchboard_upstream::Role;
use tracing::warn;

/// Largest pre-stream error body the gateway will read back.
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Everything the stream task needs to dispatch and account one stream.
pub struct StreamContext {
    /// Backend base URL; the breaker key.
    pub backend: String,
    /// Full endpoint URL on that backend.
    pub endpoint: String,
    pub role: Role,
    pub tenant: String,
    pub model: String,
    /// Approximate tokens recorded against quota once the stream starts.
    pub approx_tokens: u64,
}

/// Proxies one streaming request. Always returns HTTP 200 with SSE
/// headers; errors are carried in-band.
pub fn proxy_stream(
    gateway: Arc<Gateway>,
    ctx: StreamContext,
    mut payload: Value,
    permit: GatePermit,
) -> Response<Body> {
    payload["stream"] = Value::Bool(true);

    let body_stream = stream! {
        // Holds the tenant's concurrency slot for the stream's lifetime.
        let _permit = permit;

        if gateway.breakers.try_acquire(&ctx.backend).is_err() {
            yield Ok::<_, Infallible>(error_frame(
                "Backend temporarily unavailable",
                "service_unavailable",
                json!("backend_unavailable"),
            ));
            yield Ok(DONE_FRAME.to_string());
            return;
        }

        let started = Instant::now();
        let sent = gateway
            .client
            .post(&ctx.endpoint)
            .bearer_auth(&gateway.settings.backend_api_key)
            .json(&payload)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(error) => {
                gateway.breakers.record_failure(&ctx.backend);
                let message = redact::scrub_if(
                    gateway.settings.enable_pii_redaction,
                    &error.to_string(),
                );
                warn!(backend = %ctx.backend, error = %message, "stream connect failed");
                yield Ok(error_frame(&message, "api_error", json!("stream_proxy_exception")));
                yield Ok(DONE_FRAME.to_string());
                return;
            }
        };

        let status = response.status();
        counter!(
            "gateway_backend_requests_total",
            "backend" => ctx.backend.clone(),
            "role" => ctx.role.as_str(),
            "status" => status.as_u16().to_string()
        )
        .increment(1);

        // The backend failed before producing any SSE content: surface its
        // error as exactly one normalized frame on a 200 stream.
        if status.as_u16() >= 400 {
            if status.is_server_error() {
                gateway.breakers.record_failure(&ctx.backend);
            } else {
                gateway.breakers.record_success(&ctx.backend);
            }
            let body = read_error_body(response).await;
            yield Ok(upstream_error_frame(status.as_u16(), &body));
            yield Ok(DONE_FRAME.to_string());
            return;
        }

        // The stream is live; account the approximate spend now, since the
        // real usage never comes back on this path.
        gateway.quota.record(&ctx.tenant, ctx.approx_tokens);
        counter!(
            "gateway_tokens_processed_total",
            "tenant" => ctx.tenant.clone(),
            "model" => ctx.model.clone(),
            "role" => ctx.role.as_str()
        )
        .increment(ctx.approx_tokens);

        let idle_timeout = gateway.settings.stream_idle_timeout();
        let max_duration = gateway.settings.max_request();
        let mut upstream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut broke = false;

        'relay: loop {
            if started.elapsed() > max_duration {
                warn!(backend = %ctx.backend, "stream exceeded max request duration");
                break 'relay;
            }

            match tokio::time::timeout(idle_timeout, upstream.next()).await {
                // No chunk within the idle window.
                Err(_) => {
                    warn!(
                        backend = %ctx.backend,
                        idle_secs = idle_timeout.as_secs(),
                        "stream idle timeout"
                    );
                    yield Ok(error_frame("Stream idle timeout", "timeout", json!("stream_timeout")));
                    broke = true;
                    break 'relay;
                }
                // Upstream closed cleanly without a [DONE] sentinel.
                Ok(None) => break 'relay,
                Ok(Some(Err(error))) => {
                    let message = redact::scrub_if(
                        gateway.settings.enable_pii_redaction,
                        &error.to_string(),
                    );
                    warn!(backend = %ctx.backend, error = %message, "stream read failed");
                    yield Ok(error_frame(&message, "api_error", json!("stream_proxy_exception")));
                    broke = true;
                    break 'relay;
                }
                Ok(Some(Ok(chunk))) => {
                    buffer.extend_from_slice(&chunk);
                    while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(..=newline).collect();
                        let line = String::from_utf8_lossy(&line_bytes[..newline]);
                        match transform_line(&line) {
                            LineAction::Frame(frame) => yield Ok(frame),
                            LineAction::Skip => {}
                            LineAction::Done => {
                                gateway.breakers.record_success(&ctx.backend);
                                histogram!(
                                    "gateway_backend_duration_seconds",
                                    "backend" => ctx.backend.clone(),
                                    "role" => ctx.role.as_str()
                                )
                                .record(started.elapsed().as_secs_f64());
                                yield Ok(DONE_FRAME.to_string());
                                return;
                            }
                        }
                    }
                }
            }
        }

        // A partial line left in the buffer is still worth relaying.
        if !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).into_owned();
            if let LineAction::Frame(frame) = transform_line(&line) {
                yield Ok(frame);
            }
        }

        if broke {
            gateway.breakers.record_failure(&ctx.backend);
        } else {
            gateway.breakers.record_success(&ctx.backend);
        }
        histogram!(
            "gateway_backend_duration_seconds",
            "backend" => ctx.backend.clone(),
            "role" => ctx.role.as_str()
        )
        .record(started.elapsed().as_secs_f64());
        yield Ok(DONE_FRAME.to_string());
    };

    let mut response = Response::new(Body::from_stream(body_stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    // Tells buffering edge proxies to pass chunks through immediately.
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

async fn read_error_body(response: reqwest::Response) -> Vec<u8> {
    match response.bytes().await {
        Ok(bytes) => {
            let mut body = bytes.to_vec();
            body.truncate(MAX_ERROR_BODY_BYTES);
            body
        }
        Err(_) => Vec::new(),
    }
}
