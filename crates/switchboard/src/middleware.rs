//! Edge middleware: correlation IDs, request logs, request metrics.
//!
//! Every response, rejected or served, carries `X-Correlation-ID`.
//! `request_started` and `request_completed`/`request_failed` log lines
//! share that ID so a request can be traced across the gateway's output.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::tenant;

pub async fn observe(request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let tenant = tenant::client_key_from_request(&request);
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    info!(
        correlation_id = %correlation_id,
        tenant = %tenant,
        method = %method,
        path = %path,
        "request_started"
    );

    let mut response = next.run(request).await;

    let status = response.status().as_u16();
    let duration = started.elapsed();

    counter!(
        "gateway_requests_total",
        "endpoint" => path.clone(),
        "method" => method.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "endpoint" => path.clone(),
        "method" => method.clone()
    )
    .record(duration.as_secs_f64());

    let event = if response.status().is_server_error() {
        "request_failed"
    } else {
        "request_completed"
    };
    info!(
        correlation_id = %correlation_id,
        tenant = %tenant,
        method = %method,
        path = %path,
        status,
        duration_ms = duration.as_millis() as u64,
        "{event}"
    );

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert("x-correlation-id", value);
    }
    response
}
