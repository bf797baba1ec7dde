//! Consumers of session output.

use detstream_analytics::AnalyticsFrame;
use detstream_protocol::ControlMessage;

use crate::decoder::Frame;
use crate::error::SessionIssue;
use crate::state::SessionState;

/// Receives decoded video frames, in arrival order.
pub trait FrameSink {
    fn show(&mut self, frame: Frame);
}

impl<F: FnMut(Frame)> FrameSink for F {
    fn show(&mut self, frame: Frame) {
        self(frame)
    }
}

/// Receives analytics, recovered issues and lifecycle changes.
pub trait ReportSink {
    fn on_analytics(&mut self, frame: &AnalyticsFrame);

    fn on_issue(&mut self, issue: &SessionIssue);

    fn on_state(&mut self, _from: &SessionState, _to: &SessionState) {}

    /// A structured message of a kind this client does not know.
    fn on_unknown(&mut self, _msg: &ControlMessage) {}
}
