//! One-shot JSON proxying under a circuit-breaker guard.

use crate::error::GatewayError;
use crate::redact;
use crate::state::Gateway;
use metrics::{counter, histogram};
use serde_json::Value;
use std::time::Instant;
use switchboard_upstream::Role;
use tracing::warn;

/// POSTs `payload` to `endpoint` on the backend rooted at `backend`.
///
/// * 2xx returns the parsed body.
/// * Non-2xx surfaces as [`GatewayError::Upstream`] with the status and
///   body passed through (a backend 429 reaches the client as a 429).
/// * Timeouts map to 504, connection failures to 502.
///
/// Transport failures and 5xx responses count against the backend's
/// breaker; 4xx responses are the backend working as intended and count
/// as successes.
pub async fn proxy_json(
    gateway: &Gateway,
    backend: &str,
    endpoint: &str,
    payload: &Value,
    role: Role,
) -> Result<Value, GatewayError> {
    gateway.breakers.try_acquire(backend)?;

    let started = Instant::now();
    let result = gateway
        .client
        .post(endpoint)
        .bearer_auth(&gateway.settings.backend_api_key)
        .json(payload)
        .timeout(gateway.settings.max_request())
        .send()
        .await;

    let response = match result {
        Ok(response) => response,
        Err(error) => {
            gateway.breakers.record_failure(backend);
            let message = redact::scrub_if(
                gateway.settings.enable_pii_redaction,
                &error.to_string(),
            );
            warn!(backend, role = role.as_str(), error = %message, "backend request failed");
            return Err(if error.is_timeout() {
                GatewayError::GatewayTimeout
            } else {
                GatewayError::BadGateway
            });
        }
    };

    let status = response.status();
    counter!(
        "gateway_backend_requests_total",
        "backend" => backend.to_string(),
        "role" => role.as_str(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    if status.is_success() {
        match response.json::<Value>().await {
            Ok(body) => {
                gateway.breakers.record_success(backend);
                histogram!(
                    "gateway_backend_duration_seconds",
                    "backend" => backend.to_string(),
                    "role" => role.as_str()
                )
                .record(started.elapsed().as_secs_f64());
                Ok(body)
            }
            Err(error) => {
                gateway.breakers.record_failure(backend);
                warn!(backend, %error, "backend returned unparsable success body");
                Err(GatewayError::BadGateway)
            }
        }
    } else {
        if status.is_server_error() {
            gateway.breakers.record_failure(backend);
        } else {
            gateway.breakers.record_success(backend);
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text)
            .unwrap_or_else(|_| serde_json::json!({ "detail": text }));
        Err(GatewayError::Upstream { status, body })
    }
}
