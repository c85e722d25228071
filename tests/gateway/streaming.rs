//! SSE reframing: stripping, error normalization, idle timeout, and the
//! terminal `[DONE]` guarantee.

use super::support::*;
use serde_json::{json, Value};

fn streaming_chat_body() -> Value {
    let mut body = chat_body();
    body["stream"] = json!(true);
    body
}

fn frame_json(frame: &str) -> Value {
    let payload = frame
        .strip_prefix("data: ")
        .and_then(|f| f.strip_suffix("\n\n"))
        .expect("well-formed frame");
    serde_json::from_str(payload).expect("JSON frame payload")
}

#[tokio::test]
async fn backend_internal_fields_are_stripped_from_the_stream() {
    let backend = sse_backend(
        "data: {\"choices\":[{\"delta\":{\"content\":\"hi\",\"reasoning_content\":\"x\",\"token_ids\":[1,2]}}],\"prompt_token_ids\":[9]}\n\ndata: [DONE]\n\n",
    )
    .await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    let response = handle.post("/v1/chat/completions", &streaming_chat_body()).await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_eq!(response.headers()["cache-control"], "no-cache");
    assert_eq!(response.headers()["x-accel-buffering"], "no");
    assert!(
        response.headers().get("content-encoding").is_none(),
        "SSE responses must not be compressed"
    );

    let body = response.text().await.unwrap();
    let frames = frames(&body);
    assert_eq!(frames.len(), 2, "body: {body:?}");
    assert_eq!(
        frame_json(frames[0]),
        json!({"choices": [{"delta": {"content": "hi"}}]})
    );
    assert_eq!(frames[1], "data: [DONE]\n\n");
}

#[tokio::test]
async fn non_data_lines_are_dropped() {
    let backend = sse_backend(
        ": comment\nevent: ping\nid: 3\nretry: 100\ndata: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\ndata: [DONE]\n\n",
    )
    .await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    let body = handle
        .post("/v1/chat/completions", &streaming_chat_body())
        .await
        .text()
        .await
        .unwrap();
    let frames = frames(&body);
    assert_eq!(frames.len(), 2);
    assert_eq!(
        frame_json(frames[0]),
        json!({"choices": [{"delta": {"content": "a"}}]})
    );
}

#[tokio::test]
async fn pre_stream_backend_error_becomes_one_frame_on_a_200_stream() {
    let (backend, _) = error_backend(
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": {"message": "oom", "type": "server", "code": "OOM"}}),
    )
    .await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    let response = handle.post("/v1/chat/completions", &streaming_chat_body()).await;
    assert_eq!(response.status(), 200, "stream errors never become HTTP errors");

    let body = response.text().await.unwrap();
    let frames = frames(&body);
    assert_eq!(frames.len(), 2, "body: {body:?}");
    assert_eq!(
        frame_json(frames[0]),
        json!({"error": {"message": "oom", "type": "server", "code": "OOM"}})
    );
    assert_eq!(frames[1], "data: [DONE]\n\n");
}

#[tokio::test]
async fn idle_stream_is_terminated_with_a_timeout_frame() {
    let backend =
        stalling_sse_backend("data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n").await;
    let mut settings = settings_single(&backend);
    settings.stream_idle_timeout_secs = 0.2;
    let handle = spawn_gateway(settings).await;

    let body = handle
        .post("/v1/chat/completions", &streaming_chat_body())
        .await
        .text()
        .await
        .unwrap();
    let frames = frames(&body);
    assert_eq!(frames.len(), 3, "body: {body:?}");
    assert_eq!(
        frame_json(frames[1]),
        json!({"error": {"message": "Stream idle timeout", "type": "timeout", "code": "stream_timeout"}})
    );
    assert_eq!(*frames.last().unwrap(), "data: [DONE]\n\n");
}

#[tokio::test]
async fn stream_errors_normalize_string_errors() {
    let backend = sse_backend("data: {\"error\":\"backend oom\"}\n\ndata: [DONE]\n\n").await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    let body = handle
        .post("/v1/chat/completions", &streaming_chat_body())
        .await
        .text()
        .await
        .unwrap();
    let frames = frames(&body);
    assert_eq!(
        frame_json(frames[0]),
        json!({"error": {"message": "backend oom", "type": "api_error", "code": null}})
    );
    assert_eq!(*frames.last().unwrap(), "data: [DONE]\n\n");
}

#[tokio::test]
async fn upstream_end_without_done_still_terminates_with_done() {
    let backend = sse_backend("data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}\n\n").await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    let body = handle
        .post("/v1/chat/completions", &streaming_chat_body())
        .await
        .text()
        .await
        .unwrap();
    let frames = frames(&body);
    assert_eq!(*frames.last().unwrap(), "data: [DONE]\n\n");
}

#[tokio::test]
async fn streams_count_approximate_tokens_against_quota() {
    let backend = sse_backend("data: [DONE]\n\n").await;
    let handle = spawn_gateway(settings_single(&backend)).await;

    let response = handle.post("/v1/chat/completions", &streaming_chat_body()).await;
    let _ = response.text().await.unwrap();

    let usage = handle.gateway.quota.usage("203.0.113.9");
    assert_eq!(usage.daily_requests, 1);
    // Prompt estimate plus the fixed 500-token chat stream estimate.
    assert!(usage.daily_tokens >= 500, "usage: {usage:?}");
}
