//! Token estimation for quota accounting.
//!
//! A pure character-count heuristic (~4 characters per token) plus the
//! fixed per-message framing overhead of chat templates. Deliberately
//! model-free: quota enforcement needs a stable estimate, not an exact
//! count.

use serde_json::Value;

const TOKENS_PER_MESSAGE: u64 = 4;
const TOKENS_PER_NAME: u64 = 1;
const REPLY_PRIMING_TOKENS: u64 = 3;
const COMPLETION_CAP: u64 = 4096;
const DEFAULT_COMPLETION_ESTIMATE: u64 = 512;

/// Estimates prompt tokens for a `messages` array, a bare `prompt` string,
/// or an array of prompt strings.
pub fn estimate_prompt_tokens(prompt: &Value) -> u64 {
    match prompt {
        Value::String(text) => text_tokens(text),
        Value::Array(items) => {
            let mut tokens = 0;
            let mut saw_message = false;
            for item in items {
                match item {
                    Value::String(text) => tokens += text_tokens(text),
                    Value::Object(fields) => {
                        saw_message = true;
                        tokens += TOKENS_PER_MESSAGE;
                        for (key, value) in fields {
                            if let Value::String(text) = value {
                                tokens += text_tokens(text);
                                if key == "name" {
                                    tokens += TOKENS_PER_NAME;
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            if saw_message {
                tokens += REPLY_PRIMING_TOKENS;
            }
            tokens
        }
        _ => 0,
    }
}

/// The completion-side budget added to the prompt estimate before the
/// quota check: the request's `max_tokens` capped at 4096, else 512.
pub fn completion_budget(max_tokens: Option<u64>) -> u64 {
    match max_tokens {
        Some(requested) if requested > 0 => requested.min(COMPLETION_CAP),
        _ => DEFAULT_COMPLETION_ESTIMATE,
    }
}

fn text_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}
