//! Session lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use detstream_protocol::{Command, ControlKind, ControlMessage};

use crate::error::ProtocolError;

/// Reason recorded when the connection goes away.
pub const CONNECTION_CLOSED: &str = "connection closed";

/// Lifecycle state of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed(String),
}

impl SessionState {
    /// `Stopped` and `Failed` admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// How a server-reported `error` affects the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Report the error and keep the current state.
    #[default]
    Advisory,
    /// Move to `Failed`, ending the session.
    Terminal,
}

/// Outcome of feeding an event or command to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Changed {
        from: SessionState,
        to: SessionState,
    },
    Unchanged,
}

/// Owns the [`SessionState`] of one session.
///
/// Rejections are returned as [`ProtocolError`] and leave the state as it
/// was; the caller decides how loudly to report them.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    error_policy: ErrorPolicy,
}

impl SessionMachine {
    pub fn new(error_policy: ErrorPolicy) -> Self {
        Self {
            state: SessionState::Idle,
            error_policy,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Records that `command` is about to be sent.
    pub fn issue(&mut self, command: &Command) -> Result<Transition, ProtocolError> {
        use SessionState::*;

        let next = match (command, &self.state) {
            (Command::Start(_), Idle) => Starting,
            // Stop from Idle probes for a run left over from another client.
            (Command::Stop, Idle | Starting | Running) => Stopping,
            (Command::Stop, Stopping) => return Ok(Transition::Unchanged),
            _ => {
                return Err(ProtocolError::CommandRejected {
                    command: command.name(),
                    state: self.state.name().into(),
                });
            }
        };
        Ok(self.move_to(next))
    }

    /// Applies an inbound structured message.
    pub fn on_event(&mut self, msg: &ControlMessage) -> Result<Transition, ProtocolError> {
        use SessionState::*;

        if self.state.is_terminal() {
            return Err(self.unexpected(&msg.kind));
        }

        let next = match (&msg.kind, &self.state) {
            (ControlKind::Started, Idle | Starting) => Running,
            (ControlKind::Payload, Running | Stopping) => return Ok(Transition::Unchanged),
            (ControlKind::Stopped, Starting | Running | Stopping) => Stopped,
            (ControlKind::Error, _) => match self.error_policy {
                ErrorPolicy::Advisory => return Ok(Transition::Unchanged),
                ErrorPolicy::Terminal => {
                    Failed(msg.error_text().unwrap_or("remote error").to_string())
                }
            },
            (ControlKind::Unknown(_), _) => return Ok(Transition::Unchanged),
            (kind, _) => return Err(self.unexpected(kind)),
        };
        Ok(self.move_to(next))
    }

    /// The connection went away.
    pub fn on_closed(&mut self) -> Transition {
        if self.state.is_terminal() {
            return Transition::Unchanged;
        }
        self.move_to(SessionState::Failed(CONNECTION_CLOSED.into()))
    }

    fn move_to(&mut self, next: SessionState) -> Transition {
        let from = std::mem::replace(&mut self.state, next.clone());
        debug!(from = from.name(), to = next.name(), "session state changed");
        Transition::Changed { from, to: next }
    }

    fn unexpected(&self, kind: &ControlKind) -> ProtocolError {
        ProtocolError::UnexpectedEvent {
            kind: kind.to_string(),
            state: self.state.name().into(),
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new(ErrorPolicy::default())
    }
}
