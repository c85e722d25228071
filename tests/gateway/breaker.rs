//! Circuit-breaker behavior observed through the gateway.

use super::support::*;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchboard_breaker::CircuitState;

/// A backend that fails with 500 for its first `failures` requests and
/// succeeds afterwards, counting every request that reaches it.
async fn flaky_backend(failures: usize) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    let handler = move || {
        let seen = Arc::clone(&seen);
        async move {
            let hit = seen.fetch_add(1, Ordering::SeqCst);
            if hit < failures {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "injected failure"})),
                )
            } else {
                (
                    StatusCode::OK,
                    Json(json!({"choices": [], "usage": {"total_tokens": 3}})),
                )
            }
        }
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/v1/chat/completions", post(handler));
    (serve(app).await, hits)
}

#[tokio::test]
async fn breaker_trips_after_consecutive_failures_and_recovers() {
    let (backend, hits) = flaky_backend(3).await;
    let mut settings = settings_single(&backend);
    settings.circuit_failure_threshold = 3;
    settings.circuit_recovery_timeout_secs = 1.0;
    let handle = spawn_gateway(settings).await;

    // Three consecutive 500s pass through and trip the breaker.
    for _ in 0..3 {
        let response = handle.post("/v1/chat/completions", &chat_body()).await;
        assert_eq!(response.status(), 500);
    }
    assert_eq!(handle.gateway.breakers.state(&backend), CircuitState::Open);

    // The fourth request is rejected without touching the backend.
    let rejected = handle.post("/v1/chat/completions", &chat_body()).await;
    assert_eq!(rejected.status(), 503);
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    // Past the recovery timeout the next request probes the backend.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let probe = handle.post("/v1/chat/completions", &chat_body()).await;
    assert_eq!(probe.status(), 200);
    assert_eq!(hits.load(Ordering::SeqCst), 4);
    assert_eq!(
        handle.gateway.breakers.state(&backend),
        CircuitState::HalfOpen
    );

    // Three consecutive successes close the circuit again.
    for _ in 0..2 {
        let response = handle.post("/v1/chat/completions", &chat_body()).await;
        assert_eq!(response.status(), 200);
    }
    assert_eq!(handle.gateway.breakers.state(&backend), CircuitState::Closed);
}

#[tokio::test]
async fn backend_4xx_does_not_trip_the_breaker() {
    let (backend, _) = error_backend(StatusCode::TOO_MANY_REQUESTS, json!({"error": "busy"})).await;
    let mut settings = settings_single(&backend);
    settings.circuit_failure_threshold = 2;
    let handle = spawn_gateway(settings).await;

    for _ in 0..4 {
        // The backend's 429 passes straight through to the client.
        let response = handle.post("/v1/chat/completions", &chat_body()).await;
        assert_eq!(response.status(), 429);
    }
    assert_eq!(handle.gateway.breakers.state(&backend), CircuitState::Closed);
}

#[tokio::test]
async fn stream_requests_respect_an_open_breaker() {
    let (backend, hits) = flaky_backend(usize::MAX).await;
    let mut settings = settings_single(&backend);
    settings.circuit_failure_threshold = 1;
    settings.circuit_recovery_timeout_secs = 60.0;
    let handle = spawn_gateway(settings).await;

    // Trip the breaker on the JSON path.
    let response = handle.post("/v1/chat/completions", &chat_body()).await;
    assert_eq!(response.status(), 500);
    let before = hits.load(Ordering::SeqCst);

    // A streaming request now gets the in-band unavailable frame without a
    // backend call.
    let mut body = chat_body();
    body["stream"] = json!(true);
    let response = handle.post("/v1/chat/completions", &body).await;
    assert_eq!(response.status(), 200);
    let text = response.text().await.unwrap();
    let frames = frames(&text);
    assert_eq!(frames.len(), 2, "body: {text:?}");
    assert!(frames[0].contains("backend_unavailable"), "{text:?}");
    assert_eq!(frames[1], "data: [DONE]\n\n");
    assert_eq!(hits.load(Ordering::SeqCst), before);
}
