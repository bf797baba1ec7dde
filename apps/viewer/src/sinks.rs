//! Sinks that turn session output into log lines and snapshot files.

use std::path::PathBuf;

use tracing::{info, warn};

use detstream_analytics::{AnalyticsFrame, SourceVariant};
use detstream_protocol::ControlMessage;
use detstream_session::{Frame, FrameSink, ReportSink, SessionIssue, SessionState};

/// Logs analytics and issues.
#[derive(Debug, Default)]
pub struct LogReport {
    pub analytics: u64,
    pub issues: u64,
}

impl ReportSink for LogReport {
    fn on_analytics(&mut self, frame: &AnalyticsFrame) {
        self.analytics += 1;
        match frame.source_variant {
            SourceVariant::Tracks => {
                info!("Frame {}: {} tracks", frame.frame_index, frame.object_count);
                for track in &frame.objects {
                    info!(
                        "  - #{}: {} | {} ({})",
                        track.id, track.status, track.area.name, track.area.area_type
                    );
                }
            }
            SourceVariant::Lanes => {
                info!(
                    "Frame {}: {} lanes occupied | Lanes: {}",
                    frame.frame_index,
                    frame.object_count,
                    frame.lane_count.unwrap_or(0)
                );
            }
            SourceVariant::Unrecognized => {
                info!("Frame {}: unrecognized payload", frame.frame_index);
            }
        }
    }

    fn on_issue(&mut self, issue: &SessionIssue) {
        self.issues += 1;
        warn!("{issue}");
    }

    fn on_state(&mut self, from: &SessionState, to: &SessionState) {
        info!(%from, %to, "session state");
    }

    fn on_unknown(&mut self, msg: &ControlMessage) {
        info!(kind = %msg.kind, "unhandled message");
    }
}

/// Writes every Nth decoded frame to a directory as JPEG.
#[derive(Debug)]
pub struct SnapshotDisplay {
    dir: Option<PathBuf>,
    every: u64,
    seen: u64,
}

impl SnapshotDisplay {
    pub fn new(dir: Option<PathBuf>, every: u64) -> Self {
        Self {
            dir,
            every: every.max(1),
            seen: 0,
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }
}

impl FrameSink for SnapshotDisplay {
    fn show(&mut self, frame: Frame) {
        self.seen += 1;
        let Some(dir) = &self.dir else {
            return;
        };
        if (self.seen - 1) % self.every != 0 {
            return;
        }

        let path = dir.join(format!("frame-{:06}.jpg", self.seen));
        let result = std::fs::create_dir_all(dir)
            .map_err(image::ImageError::IoError)
            .and_then(|()| {
                frame
                    .image()
                    .save_with_format(&path, image::ImageFormat::Jpeg)
            });
        match result {
            Ok(()) => tracing::debug!(path = %path.display(), "snapshot written"),
            Err(e) => warn!(path = %path.display(), "failed to write snapshot: {e}"),
        }
    }
}
