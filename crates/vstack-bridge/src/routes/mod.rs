//! Route handlers for the control plane (§4.7), one module per resource.

pub mod ensure;
pub mod lease;
pub mod status;

use axum::body::Bytes;
use serde_json::Value;

/// Parse a request body as JSON, treating anything that isn't a valid JSON
/// object — an empty body, malformed JSON, a non-object top level value —
/// as `{}` (§6 "Non-JSON bodies are treated as empty objects").
pub(crate) fn parse_json_object(body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(v @ Value::Object(_)) => v,
        _ => Value::Object(Default::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_empty_object() {
        assert_eq!(parse_json_object(&Bytes::new()), Value::Object(Default::default()));
    }

    #[test]
    fn malformed_body_is_empty_object() {
        assert_eq!(
            parse_json_object(&Bytes::from_static(b"not json")),
            Value::Object(Default::default())
        );
    }

    #[test]
    fn non_object_top_level_is_empty_object() {
        assert_eq!(
            parse_json_object(&Bytes::from_static(b"[1,2,3]")),
            Value::Object(Default::default())
        );
    }

    #[test]
    fn valid_object_passes_through() {
        assert_eq!(
            parse_json_object(&Bytes::from_static(br#"{"lease_id":"x"}"#)),
            serde_json::json!({"lease_id": "x"})
        );
    }
}
