//! Inbound message classification and parsing.

use serde_json::{Map, Value};

use crate::constants::{ControlKind, KIND_FIELD, SNIPPET_LEN, WS_MAX_MESSAGE_SIZE};
use crate::fields::{self, ALGORITHM_KEYS, ERROR_TEXT_KEYS, PAYLOAD_BODY_KEYS};

/// A single unit received on the channel, classified by the channel's own
/// framing (binary frame vs text frame), never by sniffing content.
#[derive(Debug, Clone, PartialEq)]
pub enum WireUnit {
    Binary(Vec<u8>),
    Text(String),
}

/// Errors from parsing a text unit. None of them end the session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("received invalid structured message: {reason} (raw: {snippet})")]
    InvalidJson { reason: String, snippet: String },

    #[error("received invalid structured message: not an object (raw: {snippet})")]
    NotAnObject { snippet: String },

    #[error("received invalid structured message: missing \"type\" (raw: {snippet})")]
    MissingKind { snippet: String },

    #[error("received invalid structured message: {len} bytes exceeds limit")]
    TooLarge { len: usize },
}

/// A parsed structured message.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMessage {
    pub kind: ControlKind,
    /// All fields of the message, including `type`, in arrival order.
    pub fields: Map<String, Value>,
}

impl ControlMessage {
    /// Human-readable text of an `error` message (`message` or `error`).
    pub fn error_text(&self) -> Option<&str> {
        fields::lookup_str(&self.fields, ERROR_TEXT_KEYS)
    }

    /// Detector name announced by a `started` message.
    pub fn algorithm(&self) -> Option<&str> {
        fields::lookup_str(&self.fields, ALGORITHM_KEYS)
    }

    /// Analytics body of a `payload` message.
    ///
    /// Uses the `payload` or `data` wrapper object when present; otherwise
    /// the analytics fields are expected at the top level of the message.
    pub fn payload_body(&self) -> &Map<String, Value> {
        fields::lookup_object(&self.fields, PAYLOAD_BODY_KEYS).unwrap_or(&self.fields)
    }
}

/// A classified and parsed inbound unit.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    FrameBytes(Vec<u8>),
    Control(ControlMessage),
}

impl InboundEvent {
    /// Turns a wire unit into an event. Binary units are passed through
    /// untouched; text units go through [`parse`].
    pub fn from_unit(unit: WireUnit) -> Result<Self, ParseError> {
        match unit {
            WireUnit::Binary(bytes) => Ok(Self::FrameBytes(bytes)),
            WireUnit::Text(text) => parse(&text).map(Self::Control),
        }
    }
}

/// Parses a text unit into a [`ControlMessage`].
pub fn parse(text: &str) -> Result<ControlMessage, ParseError> {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        return Err(ParseError::TooLarge { len: text.len() });
    }

    let value: Value = serde_json::from_str(text).map_err(|e| ParseError::InvalidJson {
        reason: e.to_string(),
        snippet: snippet(text),
    })?;

    let Value::Object(fields) = value else {
        return Err(ParseError::NotAnObject {
            snippet: snippet(text),
        });
    };

    let kind = match fields.get(KIND_FIELD).and_then(Value::as_str) {
        Some(k) => ControlKind::from_wire(k),
        None => {
            return Err(ParseError::MissingKind {
                snippet: snippet(text),
            });
        }
    };

    Ok(ControlMessage { kind, fields })
}

/// Truncates raw text for inclusion in diagnostics.
pub fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_started_with_algorithm() {
        let msg = parse(r#"{"type":"started","algorithm":"roi-parking"}"#).unwrap();
        assert_eq!(msg.kind, ControlKind::Started);
        assert_eq!(msg.algorithm(), Some("roi-parking"));
    }

    #[test]
    fn parse_stopped() {
        let msg = parse(r#"{"type":"stopped"}"#).unwrap();
        assert_eq!(msg.kind, ControlKind::Stopped);
        assert!(msg.algorithm().is_none());
    }

    #[test]
    fn parse_error_accepts_either_key() {
        let a = parse(r#"{"type":"error","message":"source not found"}"#).unwrap();
        assert_eq!(a.error_text(), Some("source not found"));

        let b = parse(r#"{"type":"error","error":"decoder crashed"}"#).unwrap();
        assert_eq!(b.error_text(), Some("decoder crashed"));

        let c = parse(r#"{"type":"error"}"#).unwrap();
        assert_eq!(c.kind, ControlKind::Error);
        assert!(c.error_text().is_none());
    }

    #[test]
    fn parse_unknown_kind_is_kept() {
        let msg = parse(r#"{"type":"heartbeat","seq":9}"#).unwrap();
        assert_eq!(msg.kind, ControlKind::Unknown("heartbeat".into()));
        assert_eq!(msg.fields["seq"], 9);
    }

    #[test]
    fn payload_body_prefers_payload_wrapper() {
        let msg = parse(r#"{"type":"payload","payload":{"a":1},"data":{"b":2}}"#).unwrap();
        assert!(msg.payload_body().contains_key("a"));
    }

    #[test]
    fn payload_body_accepts_data_wrapper() {
        let msg = parse(r#"{"type":"payload","data":{"b":2}}"#).unwrap();
        assert!(msg.payload_body().contains_key("b"));
    }

    #[test]
    fn payload_body_falls_back_to_top_level() {
        let msg = parse(r#"{"type":"payload","lanes":[],"frame_idx":4}"#).unwrap();
        let body = msg.payload_body();
        assert!(body.contains_key("lanes"));
        assert_eq!(body["frame_idx"], 4);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse("not valid json {{{").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson { .. }));
        assert!(err.to_string().contains("received invalid structured message"));
        assert!(err.to_string().contains("not valid json"));
    }

    #[test]
    fn malformed_inputs_never_panic() {
        let inputs = [
            "",
            "{",
            "}",
            "null",
            "[1,2,3]",
            "\"type\"",
            "{\"type\":",
            "{\"type\":5}",
            "{\"type\":null}",
            "\u{0}\u{1}",
        ];
        for input in inputs {
            assert!(parse(input).is_err(), "expected error for {input:?}");
        }
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            parse("[1,2]").unwrap_err(),
            ParseError::NotAnObject { .. }
        ));
    }

    #[test]
    fn missing_kind_is_rejected() {
        assert!(matches!(
            parse(r#"{"payload":{}}"#).unwrap_err(),
            ParseError::MissingKind { .. }
        ));
    }

    #[test]
    fn oversized_text_is_rejected_without_parsing() {
        let huge = "x".repeat(WS_MAX_MESSAGE_SIZE + 1);
        assert_eq!(
            parse(&huge).unwrap_err(),
            ParseError::TooLarge { len: huge.len() }
        );
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let text = "车".repeat(SNIPPET_LEN + 10);
        let s = snippet(&text);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), SNIPPET_LEN + 3);
        assert_eq!(snippet("short"), "short");
    }

    #[test]
    fn from_unit_classifies_by_framing() {
        // A binary unit whose bytes happen to be JSON is still a frame.
        let bytes = br#"{"type":"stopped"}"#.to_vec();
        assert_eq!(
            InboundEvent::from_unit(WireUnit::Binary(bytes.clone())).unwrap(),
            InboundEvent::FrameBytes(bytes)
        );

        let event = InboundEvent::from_unit(WireUnit::Text(r#"{"type":"stopped"}"#.into())).unwrap();
        assert!(matches!(
            event,
            InboundEvent::Control(ControlMessage { kind: ControlKind::Stopped, .. })
        ));
    }
}
