//! Backend selection, the health surface, passthrough, and edge headers.

use super::support::*;
use serde_json::{json, Value};

async fn tagged_backend(tag: &'static str) -> String {
    let (url, _) = json_backend(json!({
        "served_by": tag,
        "choices": [],
        "usage": {"total_tokens": 2}
    }))
    .await;
    url
}

#[tokio::test]
async fn chat_requests_round_robin_across_healthy_backends() {
    let a = tagged_backend("a").await;
    let b = tagged_backend("b").await;
    let c = tagged_backend("c").await;
    let handle =
        spawn_gateway(settings(&[a.clone(), b.clone(), c.clone()], &a, &a, &a)).await;

    let mut served = Vec::new();
    for _ in 0..5 {
        let body: Value = handle
            .post("/v1/chat/completions", &chat_body())
            .await
            .json()
            .await
            .unwrap();
        served.push(body["served_by"].as_str().unwrap().to_string());
    }
    assert_eq!(served, ["a", "b", "c", "a", "b"]);
}

#[tokio::test]
async fn selection_wraps_over_the_currently_healthy_set() {
    let a = tagged_backend("a").await;
    let b = tagged_backend("b").await;
    // The third configured backend is dead from the start.
    let dead = "http://127.0.0.1:1".to_string();
    let handle =
        spawn_gateway(settings(&[a.clone(), b.clone(), dead], &a, &a, &a)).await;

    let mut served = Vec::new();
    for _ in 0..4 {
        let body: Value = handle
            .post("/v1/chat/completions", &chat_body())
            .await
            .json()
            .await
            .unwrap();
        served.push(body["served_by"].as_str().unwrap().to_string());
    }
    // Indexes reduce modulo the two healthy backends.
    assert_eq!(served, ["a", "b", "a", "b"]);
}

#[tokio::test]
async fn health_reports_degraded_until_every_role_is_served() {
    let live = tagged_backend("live").await;
    let dead = "http://127.0.0.1:1";

    let degraded = spawn_gateway(settings(&[live.clone()], &live, dead, &live)).await;
    let response = degraded.get("/health").await;
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert!(body["backends"]["embed"].as_array().unwrap().is_empty());

    let healthy = spawn_gateway(settings_single(&live)).await;
    let response = healthy.get("/health").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backends"]["chat"][0], live);
}

#[tokio::test]
async fn no_healthy_backend_is_a_503() {
    let dead = "http://127.0.0.1:1";
    let handle = spawn_gateway(settings_single(dead)).await;

    let response = handle.post("/v1/chat/completions", &chat_body()).await;
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn upstream_client_errors_pass_through_with_their_body() {
    let (backend, _) = error_backend(
        axum::http::StatusCode::IM_A_TEAPOT,
        json!({"error": "short and stout"}),
    )
    .await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    let response = handle.post("/v1/chat/completions", &chat_body()).await;
    assert_eq!(response.status(), 418);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "short and stout");
}

#[tokio::test]
async fn every_response_carries_a_correlation_id() {
    let (backend, _) = json_backend(json!({"choices": []})).await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    let ok = handle.post("/v1/chat/completions", &chat_body()).await;
    assert!(ok.headers().contains_key("x-correlation-id"));

    let rejected = handle
        .client
        .post(format!("{}/v1/chat/completions", handle.url))
        .json(&chat_body())
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 401);
    assert!(rejected.headers().contains_key("x-correlation-id"));

    let health = handle.get("/health").await;
    assert!(health.headers().contains_key("x-correlation-id"));
}

#[tokio::test]
async fn model_catalogue_is_served_on_both_paths() {
    let (backend, _) = json_backend(json!({"choices": []})).await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    for path in ["/v1/models", "/api/v1/models"] {
        let body: Value = handle.get(path).await.json().await.unwrap();
        assert_eq!(body["object"], "list");
        assert!(!body["data"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn completions_route_uses_the_text2sql_backend() {
    let chat = tagged_backend("chat").await;
    let sql = tagged_backend("sql").await;
    let handle = spawn_gateway(settings(&[chat.clone()], &sql, &chat, &chat)).await;

    let body: Value = handle
        .post("/v1/completions", &json!({"model": "text2sql", "prompt": "select"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["served_by"], "sql");
}

#[tokio::test]
async fn embeddings_and_rerank_are_proxied() {
    let backend = tagged_backend("any").await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    let embed: Value = handle
        .post("/v1/embeddings", &json!({"model": "bge-embed", "input": "hello"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(embed["served_by"], "any");

    let rerank: Value = handle
        .post(
            "/v1/rerank",
            &json!({"model": "bge-rerank", "query": "q", "documents": ["d"]}),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(rerank["served_by"], "any");
}
