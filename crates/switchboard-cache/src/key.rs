//! Canonical cache keys.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// The request fields that determine a response, in canonical order.
const KEY_FIELDS: [&str; 7] = [
    "model",
    "messages",
    "prompt",
    "temperature",
    "max_tokens",
    "stop",
    "top_p",
];

/// Hex SHA-256 of the canonical JSON encoding of the payload's semantic
/// fields. Absent fields are omitted; object keys serialize sorted (both
/// here and in any nested message objects), so the key is invariant under
/// reordering of the request body.
pub fn cache_key(payload: &Value) -> String {
    let mut canonical = Map::new();
    for field in KEY_FIELDS {
        if let Some(value) = payload.get(field) {
            if !value.is_null() {
                canonical.insert(field.to_string(), value.clone());
            }
        }
    }

    let encoded = Value::Object(canonical).to_string();
    let digest = Sha256::digest(encoded.as_bytes());
    format!("{digest:x}")
}
