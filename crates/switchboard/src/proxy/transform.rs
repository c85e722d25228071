//! The SSE wire transformer.
//!
//! Pure line-in, frame-out logic: everything here is independent of the
//! transport so the hard invariants can be tested without a socket. Every
//! emitted frame is `data: <payload>\n\n`, error payloads always take the
//! shape `{"error": {"message", "type", "code"}}`, and backend-internal
//! fields never survive the pass.

use serde_json::{json, Map, Value};

/// Backend-internal fields stripped from every event, wherever they can
/// appear: top level, each choice, and each choice's `delta`/`message`.
pub const STRIPPED_FIELDS: [&str; 6] = [
    "prompt_token_ids",
    "prompt_logprobs",
    "token_ids",
    "reasoning_content",
    "stop_reason",
    "kv_transfer_params",
];

/// The terminal frame of every stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// What to do with one upstream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    /// Forward this frame downstream.
    Frame(String),
    /// The upstream signalled completion; emit `[DONE]` and stop.
    Done,
    /// Drop the line (comments, `event:`, `id:`, `retry:`, blanks).
    Skip,
}

/// Transforms one upstream SSE line into a downstream action.
pub fn transform_line(line: &str) -> LineAction {
    let line = line.strip_suffix('\r').unwrap_or(line);

    let Some(payload) = line.strip_prefix("data: ") else {
        return LineAction::Skip;
    };

    if payload.trim() == "[DONE]" {
        return LineAction::Done;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(mut event) => {
            if let Some(error) = event.get("error") {
                return LineAction::Frame(frame(&json!({ "error": normalize_error(error) })));
            }
            strip_backend_fields(&mut event);
            LineAction::Frame(frame(&event))
        }
        // Best-effort passthrough for payloads that are not JSON.
        Err(_) => LineAction::Frame(format!("{line}\n\n")),
    }
}

/// Formats a JSON value as one SSE frame.
pub fn frame(event: &Value) -> String {
    format!("data: {event}\n\n")
}

/// Builds a gateway-originated error frame.
pub fn error_frame(message: &str, kind: &str, code: Value) -> String {
    frame(&json!({
        "error": {
            "message": truncate(message),
            "type": kind,
            "code": code,
        }
    }))
}

/// Builds the single error frame for a backend that failed before any SSE
/// content: its body is mined for `{error: {...}}`, `{error: "..."}` or
/// `{message: "..."}`, falling back to the raw text.
pub fn upstream_error_frame(status: u16, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);

    let error = match serde_json::from_str::<Value>(&text) {
        Ok(parsed) => match parsed.get("error") {
            Some(Value::Object(fields)) => {
                let mut fields = fields.clone();
                truncate_message(&mut fields);
                Value::Object(fields)
            }
            Some(Value::String(message)) => error_body(message, status),
            _ => match parsed.get("message") {
                Some(Value::String(message)) => error_body(message, status),
                _ => error_body(&text, status),
            },
        },
        Err(_) => error_body(&text, status),
    };

    frame(&json!({ "error": error }))
}

fn error_body(message: &str, status: u16) -> Value {
    json!({
        "message": truncate(message),
        "type": "api_error",
        "code": status,
    })
}

fn normalize_error(error: &Value) -> Value {
    match error {
        Value::String(message) => json!({
            "message": truncate(message),
            "type": "api_error",
            "code": null,
        }),
        other => other.clone(),
    }
}

/// Removes the stripped fields at every level they can appear.
pub fn strip_backend_fields(event: &mut Value) {
    strip_object(event);
    if let Some(choices) = event.get_mut("choices").and_then(Value::as_array_mut) {
        for choice in choices {
            strip_object(choice);
            for section in ["delta", "message"] {
                if let Some(inner) = choice.get_mut(section) {
                    strip_object(inner);
                }
            }
        }
    }
}

fn strip_object(value: &mut Value) {
    if let Some(fields) = value.as_object_mut() {
        for stripped in STRIPPED_FIELDS {
            fields.remove(stripped);
        }
    }
}

fn truncate(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}

fn truncate_message(fields: &mut Map<String, Value>) {
    if let Some(Value::String(message)) = fields.get("message") {
        if message.chars().count() > MAX_ERROR_MESSAGE_CHARS {
            let truncated = truncate(message);
            fields.insert("message".to_string(), Value::String(truncated));
        }
    }
}
