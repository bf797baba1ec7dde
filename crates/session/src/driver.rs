//! Session driver: sends commands and dispatches inbound traffic.
//!
//! The receive loop is sequential. Each unit is classified, decoded or
//! normalized, and handed to its sink before the next one is read, so
//! sinks observe arrival order.

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use detstream_analytics::normalize_message;
use detstream_protocol::constants::{CANCEL_FLUSH_TIMEOUT, STOP_CONFIRM_TIMEOUT};
use detstream_protocol::{
    Command, ControlKind, ControlMessage, InboundEvent, ParseError, StartParams, WireUnit, encode,
};

use crate::decoder::{DecodedFrame, decode};
use crate::error::{SessionError, SessionIssue};
use crate::sink::{FrameSink, ReportSink};
use crate::state::{ErrorPolicy, SessionMachine, SessionState, Transition};
use crate::transport::{self, Classified};

/// Parameters of one session run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Start command parameters.
    pub start: StartParams,
    /// Send `stop` and wait for confirmation before starting.
    pub stop_prior: bool,
    /// Bound on the wait for a prior run's `stopped`.
    pub stop_wait: Duration,
    pub error_policy: ErrorPolicy,
    /// Send `stop` when cancelled while starting or running.
    pub stop_on_cancel: bool,
}

impl SessionConfig {
    pub fn new(start: StartParams) -> Self {
        Self {
            start,
            stop_prior: true,
            stop_wait: STOP_CONFIRM_TIMEOUT,
            error_policy: ErrorPolicy::default(),
            stop_on_cancel: true,
        }
    }
}

/// Why the receive loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The service confirmed the run stopped.
    Stopped,
    /// The service reported an error under [`ErrorPolicy::Terminal`].
    Failed(String),
    /// The connection closed or errored.
    ConnectionClosed { error: Option<String> },
    /// Cancelled through the driver's token.
    Cancelled,
}

/// Counters collected over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_shown: u64,
    pub frames_failed: u64,
    pub analytics_frames: u64,
    pub issues: u64,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub exit: ExitReason,
    pub final_state: SessionState,
    pub stats: SessionStats,
}

/// Result of waiting for a prior run to stop.
enum PriorStop {
    Confirmed,
    Closed(Option<String>),
}

/// Wake-up source of the receive loop.
enum Wake {
    Cancelled,
    Inbound(Option<Result<tungstenite::Message, tungstenite::Error>>),
}

/// Drives a single session over one connection.
///
/// A driver is consumed by [`run`](Self::run); a new session needs a new
/// driver and a new connection.
pub struct SessionDriver<D, R> {
    config: SessionConfig,
    display: D,
    report: R,
    machine: SessionMachine,
    stats: SessionStats,
    cancel: CancellationToken,
}

impl<D: FrameSink, R: ReportSink> SessionDriver<D, R> {
    pub fn new(config: SessionConfig, display: D, report: R) -> Self {
        let machine = SessionMachine::new(config.error_policy);
        Self {
            config,
            display,
            report,
            machine,
            stats: SessionStats::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an external token for cancellation (e.g. shared with a signal
    /// handler).
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that ends the run when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Connects to `url` and runs the session to completion.
    ///
    /// Cancellation is honoured while the connection is being established.
    pub async fn connect_and_run(self, url: &str) -> Result<SessionOutcome, SessionError> {
        let cancel = self.cancel.clone();
        let (write, read) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(url, "cancelled while connecting");
                return Ok(SessionOutcome {
                    exit: ExitReason::Cancelled,
                    final_state: self.machine.state().clone(),
                    stats: self.stats,
                });
            }
            r = transport::connect(url) => r?,
        };
        self.run(read, write).await
    }

    /// Runs the session over an already-open connection.
    ///
    /// The write half is closed exactly once when this returns, whichever
    /// way the loop ended.
    pub async fn run<S, W>(mut self, mut read: S, mut write: W) -> Result<SessionOutcome, SessionError>
    where
        S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
        W: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
    {
        let result = self.drive(&mut read, &mut write).await;

        match tokio::time::timeout(CANCEL_FLUSH_TIMEOUT, write.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("error closing connection: {e}"),
            Err(_) => debug!("timed out closing connection"),
        }

        match result {
            Ok(exit) => {
                info!(
                    exit = ?exit,
                    state = %self.machine.state(),
                    frames = self.stats.frames_shown,
                    analytics = self.stats.analytics_frames,
                    "session ended"
                );
                Ok(SessionOutcome {
                    exit,
                    final_state: self.machine.state().clone(),
                    stats: self.stats,
                })
            }
            Err(e) => {
                let transition = self.machine.on_closed();
                self.emit(transition);
                Err(e)
            }
        }
    }

    async fn drive<S, W>(&mut self, read: &mut S, write: &mut W) -> Result<ExitReason, SessionError>
    where
        S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
        W: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
    {
        if self.config.stop_prior {
            if let Some(exit) = self.stop_prior(read, write).await? {
                return Ok(exit);
            }
        }

        let start = Command::Start(self.config.start.clone());
        self.issue(&start, write).await?;
        info!(source = self.config.start.source(), "start command sent");

        let cancel = self.cancel.clone();
        loop {
            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                msg = read.next() => Wake::Inbound(msg),
            };

            let msg = match wake {
                Wake::Cancelled => return Ok(self.on_cancel(write).await),
                Wake::Inbound(None) => {
                    debug!("WebSocket stream ended");
                    return Ok(self.on_closed(None));
                }
                Wake::Inbound(Some(Err(tungstenite::Error::Capacity(
                    tungstenite::error::CapacityError::MessageTooLong { size, max_size },
                )))) => {
                    warn!(size, max_size, "skipping oversized message");
                    self.issue_report(SessionIssue::Parse(ParseError::TooLarge { len: size }));
                    continue;
                }
                Wake::Inbound(Some(Err(e))) => {
                    warn!("WebSocket read error: {e}");
                    return Ok(self.on_closed(Some(e.to_string())));
                }
                Wake::Inbound(Some(Ok(msg))) => msg,
            };

            match transport::classify(msg) {
                Classified::Unit(unit) => {
                    if let Some(exit) = self.dispatch(unit) {
                        return Ok(exit);
                    }
                }
                Classified::Control => trace!("control frame"),
                Classified::Close => {
                    debug!("received close frame");
                    return Ok(self.on_closed(None));
                }
            }
        }
    }

    /// Stops a run possibly left active by another client, waiting a
    /// bounded time for confirmation. Silence means nothing was running.
    async fn stop_prior<S, W>(
        &mut self,
        read: &mut S,
        write: &mut W,
    ) -> Result<Option<ExitReason>, SessionError>
    where
        S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
        W: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
    {
        // The prior run gets its own machine so this session starts Idle.
        let mut prior = SessionMachine::new(self.config.error_policy);
        prior.issue(&Command::Stop)?;
        send(write, &Command::Stop).await?;

        let wait = self.config.stop_wait;
        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("cancelled while waiting for stop confirmation");
                return Ok(Some(ExitReason::Cancelled));
            }
            r = tokio::time::timeout(wait, self.await_stopped(read, &mut prior)) => r,
        };

        match result {
            Ok(PriorStop::Confirmed) => {
                info!("prior run confirmed stopped");
                Ok(None)
            }
            Ok(PriorStop::Closed(error)) => Ok(Some(self.on_closed(error))),
            Err(_) => {
                debug!(
                    wait_ms = wait.as_millis() as u64,
                    "no stop confirmation, assuming nothing was running"
                );
                self.issue_report(SessionIssue::Timeout(wait));
                Ok(None)
            }
        }
    }

    /// Reads until a `stopped` message arrives. Traffic left over from the
    /// prior run is skipped; malformed text and remote errors are still
    /// reported.
    async fn await_stopped<S>(&mut self, read: &mut S, prior: &mut SessionMachine) -> PriorStop
    where
        S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = match read.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(tungstenite::Error::Capacity(
                    tungstenite::error::CapacityError::MessageTooLong { size, .. },
                ))) => {
                    self.issue_report(SessionIssue::Parse(ParseError::TooLarge { len: size }));
                    continue;
                }
                Some(Err(e)) => return PriorStop::Closed(Some(e.to_string())),
                None => return PriorStop::Closed(None),
            };
            let text = match transport::classify(msg) {
                Classified::Unit(WireUnit::Text(text)) => text,
                Classified::Unit(WireUnit::Binary(_)) | Classified::Control => continue,
                Classified::Close => return PriorStop::Closed(None),
            };
            match detstream_protocol::parse(&text) {
                Ok(m) if m.kind == ControlKind::Stopped => {
                    let _ = prior.on_event(&m);
                    return PriorStop::Confirmed;
                }
                Ok(m) if m.kind == ControlKind::Error => {
                    let text = m.error_text().unwrap_or("remote error").to_string();
                    warn!("error from server while awaiting stop: {text}");
                    self.issue_report(SessionIssue::Remote(text));
                }
                Ok(m) => trace!(kind = %m.kind, "skipping message while awaiting stop"),
                Err(e) => {
                    warn!("{e}");
                    self.issue_report(SessionIssue::Parse(e));
                }
            }
        }
    }

    /// Handles one data unit. Returns the exit reason once the session
    /// reaches a terminal state.
    fn dispatch(&mut self, unit: WireUnit) -> Option<ExitReason> {
        match InboundEvent::from_unit(unit) {
            Ok(InboundEvent::FrameBytes(bytes)) => {
                self.handle_frame(&bytes);
                None
            }
            Ok(InboundEvent::Control(msg)) => self.handle_control(&msg),
            Err(e) => {
                warn!("{e}");
                self.issue_report(SessionIssue::Parse(e));
                None
            }
        }
    }

    fn handle_frame(&mut self, bytes: &[u8]) {
        match decode(bytes) {
            DecodedFrame::Image(frame) => {
                trace!(
                    bytes = bytes.len(),
                    width = frame.width(),
                    height = frame.height(),
                    "frame decoded"
                );
                self.stats.frames_shown += 1;
                self.display.show(frame);
            }
            DecodedFrame::Failed(e) => {
                warn!(bytes = e.byte_len, "failed to decode frame: {}", e.reason);
                self.stats.frames_failed += 1;
                self.issue_report(SessionIssue::Decode(e));
            }
        }
    }

    fn handle_control(&mut self, msg: &ControlMessage) -> Option<ExitReason> {
        trace!(kind = %msg.kind, "received message");

        let transition = match self.machine.on_event(msg) {
            Ok(t) => t,
            Err(e) => {
                warn!("ignoring message: {e}");
                self.issue_report(SessionIssue::Protocol(e));
                return None;
            }
        };

        match &msg.kind {
            ControlKind::Started => {
                info!(algorithm = msg.algorithm().unwrap_or("unknown"), "detection started");
            }
            ControlKind::Payload => {
                let frame = normalize_message(msg);
                trace!(
                    frame_index = %frame.frame_index,
                    objects = frame.object_count,
                    "analytics frame"
                );
                self.stats.analytics_frames += 1;
                self.report.on_analytics(&frame);
            }
            ControlKind::Error => {
                let text = msg.error_text().unwrap_or("remote error").to_string();
                warn!("error from server: {text}");
                self.issue_report(SessionIssue::Remote(text));
            }
            ControlKind::Stopped => info!("server reported stopped"),
            ControlKind::Unknown(kind) => {
                debug!(kind = %kind, "unrecognized message kind");
                self.report.on_unknown(msg);
            }
        }

        self.emit(transition);
        self.terminal_exit()
    }

    async fn on_cancel<W>(&mut self, write: &mut W) -> ExitReason
    where
        W: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
    {
        info!(state = %self.machine.state(), "session cancelled");
        let active = matches!(
            self.machine.state(),
            SessionState::Starting | SessionState::Running
        );
        if self.config.stop_on_cancel && active {
            match tokio::time::timeout(CANCEL_FLUSH_TIMEOUT, self.issue(&Command::Stop, write)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("failed to send stop on cancel: {e}"),
                Err(_) => debug!("timed out sending stop on cancel"),
            }
        }
        ExitReason::Cancelled
    }

    fn on_closed(&mut self, error: Option<String>) -> ExitReason {
        let transition = self.machine.on_closed();
        self.emit(transition);
        ExitReason::ConnectionClosed { error }
    }

    /// Validates `command` against the state machine, reports the
    /// transition, then sends it.
    async fn issue<W>(&mut self, command: &Command, write: &mut W) -> Result<(), SessionError>
    where
        W: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
    {
        let transition = self.machine.issue(command)?;
        self.emit(transition);
        send(write, command).await
    }

    fn issue_report(&mut self, issue: SessionIssue) {
        self.stats.issues += 1;
        self.report.on_issue(&issue);
    }

    fn emit(&mut self, transition: Transition) {
        if let Transition::Changed { from, to } = transition {
            self.report.on_state(&from, &to);
        }
    }

    fn terminal_exit(&self) -> Option<ExitReason> {
        match self.machine.state() {
            SessionState::Stopped => Some(ExitReason::Stopped),
            SessionState::Failed(reason) => Some(ExitReason::Failed(reason.clone())),
            _ => None,
        }
    }
}

/// Encodes and writes a command.
async fn send<W>(write: &mut W, command: &Command) -> Result<(), SessionError>
where
    W: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let text = encode(command);
    debug!(command = command.name(), "sending command");
    write.send(tungstenite::Message::Text(text.into())).await?;
    Ok(())
}
