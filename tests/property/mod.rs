//! Property coverage:
//! - cache keys are invariant under request-body key reordering
//! - the SSE transformer never leaks a stripped field and always emits
//!   wire-legal frames

use proptest::prelude::*;
use serde_json::{json, Value};
use switchboard::proxy::transform::{transform_line, LineAction, STRIPPED_FIELDS};
use switchboard_cache::cache_key;

fn field_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,40}"
}

prop_compose! {
    fn chat_payload()(
        model in "[a-z][a-z0-9-]{0,12}",
        temperature in 0.0f64..1.0,
        max_tokens in proptest::option::of(1u64..8192),
        contents in proptest::collection::vec(field_text(), 1..4),
    ) -> Vec<(String, Value)> {
        let messages: Vec<Value> = contents
            .into_iter()
            .map(|content| json!({"role": "user", "content": content}))
            .collect();
        let mut fields = vec![
            ("model".to_string(), json!(model)),
            ("messages".to_string(), json!(messages)),
            ("temperature".to_string(), json!(temperature)),
        ];
        if let Some(max_tokens) = max_tokens {
            fields.push(("max_tokens".to_string(), json!(max_tokens)));
        }
        fields
    }
}

fn object_from(fields: &[(String, Value)]) -> Value {
    let mut object = serde_json::Map::new();
    for (key, value) in fields {
        object.insert(key.clone(), value.clone());
    }
    Value::Object(object)
}

proptest! {
    #[test]
    fn cache_key_is_invariant_under_field_order(
        fields in chat_payload(),
        seed in 0usize..24,
    ) {
        let original = object_from(&fields);

        let mut rotated = fields.clone();
        let len = rotated.len();
        rotated.rotate_left(seed % len);
        let reordered = object_from(&rotated);

        prop_assert_eq!(cache_key(&original), cache_key(&reordered));
    }

    #[test]
    fn cache_key_ignores_non_semantic_fields(
        fields in chat_payload(),
        user in "[a-z]{1,10}",
    ) {
        let bare = object_from(&fields);
        let mut with_extras = fields.clone();
        with_extras.push(("user".to_string(), json!(user)));
        with_extras.push(("stream".to_string(), json!(false)));
        let extended = object_from(&with_extras);

        prop_assert_eq!(cache_key(&bare), cache_key(&extended));
    }

    #[test]
    fn transformer_never_leaks_stripped_fields(
        content in field_text(),
        stray in proptest::sample::select(STRIPPED_FIELDS.to_vec()),
        ids in proptest::collection::vec(0u32..1000, 0..4),
    ) {
        // Plant the stray field at every level the backend can emit it.
        let event = json!({
            stray: ids,
            "choices": [{
                stray: ids,
                "delta": {"content": content, stray: ids},
                "message": {"content": content, stray: ids},
            }],
        });
        let line = format!("data: {event}");

        match transform_line(&line) {
            LineAction::Frame(frame) => {
                let payload: Value = serde_json::from_str(
                    frame
                        .strip_prefix("data: ")
                        .and_then(|f| f.strip_suffix("\n\n"))
                        .expect("wire-legal frame"),
                )
                .expect("JSON frame");

                prop_assert!(payload.get(stray).is_none());
                let choice = &payload["choices"][0];
                prop_assert!(choice.get(stray).is_none());
                prop_assert!(choice["delta"].get(stray).is_none());
                prop_assert!(choice["message"].get(stray).is_none());
            }
            other => prop_assert!(false, "expected a frame, got {:?}", other),
        }
    }

    #[test]
    fn every_emitted_frame_is_wire_legal(line in "data: [ -~]{0,80}") {
        match transform_line(&line) {
            LineAction::Frame(frame) => {
                prop_assert!(frame.starts_with("data: "));
                prop_assert!(frame.ends_with("\n\n"));
            }
            LineAction::Done | LineAction::Skip => {}
        }
    }

    #[test]
    fn non_data_lines_never_propagate(line in "(event|id|retry|:)[ -~]{0,40}") {
        prop_assert_eq!(transform_line(&line), LineAction::Skip);
    }
}
