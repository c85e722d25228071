//! PII scrubbing for logged error text.
//!
//! Backend error bodies can echo user content; anything that reaches the
//! logs goes through here first when redaction is enabled. IP addresses
//! are left alone: they are the tenant key and are needed for debugging.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email pattern")
});
static SSN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern"));
static CREDIT_CARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").expect("credit card pattern"));
static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+?1[-.]?)?\(?([0-9]{3})\)?[-.]?([0-9]{3})[-.]?([0-9]{4})\b")
        .expect("phone pattern")
});

/// Replaces common PII shapes with placeholder tokens, most specific
/// patterns first so the phone matcher cannot eat part of an SSN or card
/// number.
pub fn scrub(text: &str) -> String {
    let text = EMAIL.replace_all(text, "[EMAIL]");
    let text = SSN.replace_all(&text, "[SSN]");
    let text = CREDIT_CARD.replace_all(&text, "[CC]");
    let text = PHONE.replace_all(&text, "[PHONE]");
    text.into_owned()
}

/// Scrubs only when the redaction toggle is on.
pub fn scrub_if(enabled: bool, text: &str) -> String {
    if enabled {
        scrub(text)
    } else {
        text.to_string()
    }
}
