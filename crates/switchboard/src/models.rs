//! Model aliasing and the static model catalogue.

use serde_json::{json, Value};

/// Canonical model served by the chat pool.
pub const CHAT_MODEL: &str = "qwen-chat";
/// Canonical model served by the text2sql backend.
pub const TEXT2SQL_MODEL: &str = "qwen-text2sql";

const ALIASES: &[(&str, &str)] = &[
    ("gpt-3.5-turbo", CHAT_MODEL),
    ("gpt-4", CHAT_MODEL),
    ("gpt-4o", CHAT_MODEL),
    ("qwen", CHAT_MODEL),
    ("default", CHAT_MODEL),
    ("text2sql", TEXT2SQL_MODEL),
];

/// Maps a client-supplied model name onto the canonical backend model.
/// Unknown names pass through untouched.
pub fn resolve_alias(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// The static catalogue behind `GET /v1/models`.
pub fn catalogue() -> Value {
    let data: Vec<Value> = [CHAT_MODEL, TEXT2SQL_MODEL, "bge-embed", "bge-rerank"]
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "object": "model",
                "created": 1_700_000_000,
                "owned_by": "switchboard",
            })
        })
        .collect();

    json!({ "object": "list", "data": data })
}
