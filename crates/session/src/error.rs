//! Error types for the session crate.

use std::fmt;
use std::time::Duration;

use tokio_tungstenite::tungstenite;

use detstream_protocol::{CommandError, ParseError};

use crate::decoder::DecodeError;

/// Errors that end a session run.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("invalid command: {0}")]
    Command(#[from] CommandError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// An event or command that does not fit the current session state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unexpected \"{kind}\" message while {state}")]
    UnexpectedEvent { kind: String, state: String },

    #[error("cannot send \"{command}\" while {state}")]
    CommandRejected {
        command: &'static str,
        state: String,
    },
}

/// A recovered problem, reported to the sink while the session continues.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionIssue {
    /// Malformed structured text.
    Parse(ParseError),
    /// Binary unit that is not a decodable image.
    Decode(DecodeError),
    /// Event out of order for the current state.
    Protocol(ProtocolError),
    /// Error reported by the detection service.
    Remote(String),
    /// A bounded wait elapsed.
    Timeout(Duration),
}

impl fmt::Display for SessionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Decode(e) => write!(f, "{e}"),
            Self::Protocol(e) => write!(f, "{e}"),
            Self::Remote(msg) => write!(f, "error from server: {msg}"),
            Self::Timeout(d) => write!(f, "no confirmation within {}ms", d.as_millis()),
        }
    }
}
