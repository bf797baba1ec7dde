//! Client session for a detection service feed.
//!
//! Issues control commands over a WebSocket, tracks the session
//! lifecycle, decodes JPEG frames and normalizes analytics payloads,
//! handing results to caller-provided sinks in arrival order.

pub mod decoder;
pub mod driver;
pub mod error;
pub mod sink;
pub mod state;
pub mod transport;

pub use decoder::{DecodeError, DecodedFrame, Frame, decode};
pub use driver::{ExitReason, SessionConfig, SessionDriver, SessionOutcome, SessionStats};
pub use error::{ProtocolError, SessionError, SessionIssue};
pub use sink::{FrameSink, ReportSink};
pub use state::{ErrorPolicy, SessionMachine, SessionState, Transition};
