//! Ordered-fallback field lookups.
//!
//! The detection service has shipped several message layouts over time.
//! Every alias accepted for a field is listed here, most preferred first,
//! and resolved through [`lookup`] so the accepted set can be audited in
//! one place.

use serde_json::{Map, Value};

/// Wrapper keys that may carry the analytics body of a `payload` message.
pub const PAYLOAD_BODY_KEYS: &[&str] = &["payload", "data"];

/// Keys that may carry the human-readable text of an `error` message.
pub const ERROR_TEXT_KEYS: &[&str] = &["message", "error"];

/// Keys that may carry the detector name of a `started` message.
pub const ALGORITHM_KEYS: &[&str] = &["algorithm"];

/// Frame index keys of the track-oriented analytics shape.
pub const TRACK_FRAME_INDEX_KEYS: &[&str] = &["frame_index", "frame"];

/// Frame index keys of the lane-oriented analytics shape.
pub const LANE_FRAME_INDEX_KEYS: &[&str] = &["frame_idx"];

/// Returns the first key in `keys` that is present with a non-null value.
pub fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find(|v| !v.is_null())
}

/// Like [`lookup`], but only accepts string values.
pub fn lookup_str<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find_map(Value::as_str)
}

/// Like [`lookup`], but only accepts object values.
pub fn lookup_object<'a>(
    fields: &'a Map<String, Value>,
    keys: &[&str],
) -> Option<&'a Map<String, Value>> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find_map(Value::as_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn first_present_key_wins() {
        let fields = obj(json!({"frame": 3, "frame_index": 7}));
        assert_eq!(lookup(&fields, TRACK_FRAME_INDEX_KEYS), Some(&json!(7)));
    }

    #[test]
    fn falls_back_to_later_key() {
        let fields = obj(json!({"frame": 3}));
        assert_eq!(lookup(&fields, TRACK_FRAME_INDEX_KEYS), Some(&json!(3)));
    }

    #[test]
    fn null_counts_as_absent() {
        let fields = obj(json!({"frame_index": null, "frame": 0}));
        assert_eq!(lookup(&fields, TRACK_FRAME_INDEX_KEYS), Some(&json!(0)));
    }

    #[test]
    fn missing_everywhere() {
        let fields = obj(json!({"other": 1}));
        assert!(lookup(&fields, TRACK_FRAME_INDEX_KEYS).is_none());
    }

    #[test]
    fn lookup_str_skips_non_strings() {
        let fields = obj(json!({"message": 42, "error": "boom"}));
        assert_eq!(lookup_str(&fields, ERROR_TEXT_KEYS), Some("boom"));
    }

    #[test]
    fn lookup_object_skips_non_objects() {
        let fields = obj(json!({"payload": "nope", "data": {"lanes": []}}));
        let body = lookup_object(&fields, PAYLOAD_BODY_KEYS).unwrap();
        assert!(body.contains_key("lanes"));
    }
}
