//! Quota enforcement, cache accounting, and the admin surface.

use super::support::*;
use serde_json::{json, Value};

#[tokio::test]
async fn quota_denial_is_429_with_a_reset_header() {
    let (backend, _) = json_backend(json!({"choices": [], "usage": {"total_tokens": 5}})).await;
    let mut settings = settings_single(&backend);
    settings.org_daily_request_limit = 1;
    let handle = spawn_gateway(settings).await;

    let first = handle.post("/v1/chat/completions", &chat_body()).await;
    assert_eq!(first.status(), 200);

    let second = handle.post("/v1/chat/completions", &chat_body()).await;
    assert_eq!(second.status(), 429);
    let reset = second.headers()["x-quota-reset"].to_str().unwrap();
    assert!(reset.contains('T'), "expected ISO-8601 timestamp, got {reset}");
    let body: Value = second.json().await.unwrap();
    assert!(
        body["detail"].as_str().unwrap().contains("daily_requests"),
        "{body}"
    );
}

#[tokio::test]
async fn token_quota_counts_real_usage_from_responses() {
    let (backend, _) = json_backend(json!({"choices": [], "usage": {"total_tokens": 40}})).await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    handle.post("/v1/chat/completions", &chat_body()).await;
    handle.post("/v1/chat/completions", &chat_body()).await;

    let usage = handle.gateway.quota.usage("203.0.113.9");
    assert_eq!(usage.daily_tokens, 80);
    assert_eq!(usage.daily_requests, 2);
    assert_eq!(usage.monthly_tokens, 80);
}

#[tokio::test]
async fn deterministic_requests_are_served_from_cache() {
    let (backend, hits) =
        json_backend(json!({"choices": [{"message": {"content": "4"}}], "usage": {"total_tokens": 7}}))
            .await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    let body = json!({
        "model": "qwen",
        "messages": [{"role": "user", "content": "2+2?"}],
        "temperature": 0.0
    });

    let first: Value = handle.post("/v1/chat/completions", &body).await.json().await.unwrap();
    let second: Value = handle.post("/v1/chat/completions", &body).await.json().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        hits.load(std::sync::atomic::Ordering::SeqCst),
        1,
        "second request must be a cache hit"
    );

    // The hit still counts as a request, at zero tokens.
    let usage = handle.gateway.quota.usage("203.0.113.9");
    assert_eq!(usage.daily_requests, 2);
    assert_eq!(usage.daily_tokens, 7);
}

#[tokio::test]
async fn default_temperature_requests_bypass_the_cache() {
    let (backend, hits) = json_backend(json!({"choices": [], "usage": {"total_tokens": 1}})).await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    handle.post("/v1/chat/completions", &chat_body()).await;
    handle.post("/v1/chat/completions", &chat_body()).await;
    assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn admin_quota_requires_the_gateway_token() {
    let (backend, _) = json_backend(json!({"choices": [], "usage": {"total_tokens": 9}})).await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    handle.post_as("/v1/chat/completions", &chat_body(), "10.1.1.1").await;

    let unauthorized = handle.get("/admin/quotas").await;
    assert_eq!(unauthorized.status(), 401);

    let forbidden = handle
        .client
        .get(format!("{}/admin/quotas", handle.url))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);

    let all: Value = handle
        .client
        .get(format!("{}/admin/quotas", handle.url))
        .bearer_auth(GATEWAY_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["10.1.1.1"]["daily_tokens"], 9);

    let one: Value = handle
        .client
        .get(format!("{}/admin/quota/10.1.1.1", handle.url))
        .bearer_auth(GATEWAY_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(one["daily_requests"], 1);
    assert!(one["daily_reset_at"].as_str().unwrap().contains('T'));
}
