use std::fmt;
use std::time::Duration;

/// Maximum inbound message size in bytes (16 MB).
///
/// Large enough for a full-resolution JPEG frame; text messages above
/// this size are rejected without parsing.
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Hard limit enforced by the WebSocket transport (64 MB).
///
/// Kept above [`WS_MAX_MESSAGE_SIZE`] so oversized text reaches the codec
/// and is skipped there instead of failing the read.
pub const WS_TRANSPORT_MAX_SIZE: usize = 4 * WS_MAX_MESSAGE_SIZE;

const _: () = assert!(WS_TRANSPORT_MAX_SIZE > WS_MAX_MESSAGE_SIZE);

/// Bound on the best-effort `stop` and close performed on cancellation.
pub const CANCEL_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait for a `stopped` confirmation before starting a new run.
pub const STOP_CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum number of characters of a raw message kept for diagnostics.
pub const SNIPPET_LEN: usize = 120;

/// Name of the discriminator field carried by every structured message.
pub const KIND_FIELD: &str = "type";

/// Kind of a structured message received from the detection service.
///
/// Unrecognized kinds are preserved verbatim in [`ControlKind::Unknown`]
/// so newer servers do not get their messages dropped on the floor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Started,
    Payload,
    Error,
    Stopped,
    Unknown(String),
}

impl ControlKind {
    /// Maps a wire `type` value to a kind.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "started" => Self::Started,
            "payload" => Self::Payload,
            "error" => Self::Error,
            "stopped" => Self::Stopped,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns the wire `type` value for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Started => "started",
            Self::Payload => "payload",
            Self::Error => "error",
            Self::Stopped => "stopped",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_roundtrip() {
        for kind in [
            ControlKind::Started,
            ControlKind::Payload,
            ControlKind::Error,
            ControlKind::Stopped,
        ] {
            assert_eq!(ControlKind::from_wire(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_preserved() {
        let kind = ControlKind::from_wire("frame");
        assert_eq!(kind, ControlKind::Unknown("frame".into()));
        assert_eq!(kind.to_string(), "frame");
    }

    #[test]
    fn kind_matching_is_case_sensitive() {
        assert_eq!(
            ControlKind::from_wire("Started"),
            ControlKind::Unknown("Started".into())
        );
    }
}
