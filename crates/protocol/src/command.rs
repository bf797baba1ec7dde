//! Outbound control commands.

use std::num::NonZeroU32;

use serde::Serialize;

/// Errors raised while building a command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("source must not be empty")]
    EmptySource,

    #[error("confidence threshold must be within [0, 1], got {0}")]
    ConfThresOutOfRange(f64),

    #[error("frame gap must be a positive integer")]
    ZeroFrameGap,
}

/// Parameters of a `start` command.
///
/// Optional tuning fields are omitted from the wire form when unset; the
/// detection service applies its own defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartParams {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conf_thres: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_gap: Option<NonZeroU32>,
}

impl StartParams {
    /// Creates start parameters for the given video source.
    pub fn new(source: impl Into<String>) -> Result<Self, CommandError> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(CommandError::EmptySource);
        }
        Ok(Self {
            source,
            conf_thres: None,
            frame_gap: None,
        })
    }

    /// Sets the detection confidence threshold.
    pub fn with_conf_thres(mut self, conf_thres: f64) -> Result<Self, CommandError> {
        if !(0.0..=1.0).contains(&conf_thres) {
            return Err(CommandError::ConfThresOutOfRange(conf_thres));
        }
        self.conf_thres = Some(conf_thres);
        Ok(self)
    }

    /// Sets the sampling gap between analysed frames.
    pub fn with_frame_gap(mut self, frame_gap: u32) -> Result<Self, CommandError> {
        let gap = NonZeroU32::new(frame_gap).ok_or(CommandError::ZeroFrameGap)?;
        self.frame_gap = Some(gap);
        Ok(self)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn conf_thres(&self) -> Option<f64> {
        self.conf_thres
    }

    pub fn frame_gap(&self) -> Option<u32> {
        self.frame_gap.map(NonZeroU32::get)
    }
}

/// Instruction sent from the client to the detection service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    Start(StartParams),
    Stop,
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Stop => "stop",
        }
    }
}

/// Serializes a command into its canonical text form.
///
/// Field order is fixed by declaration order, so equal commands always
/// produce identical bytes.
pub fn encode(command: &Command) -> String {
    // Serialization of these types has no failure modes: string keys,
    // finite numbers only (range-checked at construction).
    serde_json::to_string(command).unwrap_or_else(|_| {
        format!(r#"{{"type":"{}"}}"#, command.name())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_stop() {
        assert_eq!(encode(&Command::Stop), r#"{"type":"stop"}"#);
    }

    #[test]
    fn encode_start_minimal_omits_optional_fields() {
        let cmd = Command::Start(StartParams::new("rtsp://cam/stream").unwrap());
        assert_eq!(
            encode(&cmd),
            r#"{"type":"start","source":"rtsp://cam/stream"}"#
        );
    }

    #[test]
    fn encode_start_with_tuning() {
        let params = StartParams::new("/app/source/lane.mp4")
            .unwrap()
            .with_conf_thres(0.65)
            .unwrap()
            .with_frame_gap(2)
            .unwrap();
        let json = encode(&Command::Start(params));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["source"], "/app/source/lane.mp4");
        assert_eq!(value["conf_thres"], 0.65);
        assert_eq!(value["frame_gap"], 2);
    }

    #[test]
    fn encode_is_deterministic() {
        let params = StartParams::new("a.mp4")
            .unwrap()
            .with_frame_gap(5)
            .unwrap();
        let cmd = Command::Start(params);
        let first = encode(&cmd);
        for _ in 0..10 {
            assert_eq!(encode(&cmd.clone()), first);
        }
    }

    #[test]
    fn encode_preserves_non_ascii_source() {
        let cmd = Command::Start(StartParams::new("/app/source/侵占消防通道.mp4").unwrap());
        let value: serde_json::Value = serde_json::from_str(&encode(&cmd)).unwrap();
        assert_eq!(value["source"], "/app/source/侵占消防通道.mp4");
    }

    #[test]
    fn rejects_empty_source() {
        assert_eq!(StartParams::new("  "), Err(CommandError::EmptySource));
    }

    #[test]
    fn rejects_conf_thres_out_of_range() {
        let params = StartParams::new("a.mp4").unwrap();
        assert!(params.clone().with_conf_thres(1.5).is_err());
        assert!(params.clone().with_conf_thres(-0.1).is_err());
        assert!(params.clone().with_conf_thres(f64::NAN).is_err());
        assert!(params.clone().with_conf_thres(0.0).is_ok());
        assert!(params.with_conf_thres(1.0).is_ok());
    }

    #[test]
    fn rejects_zero_frame_gap() {
        let params = StartParams::new("a.mp4").unwrap();
        assert_eq!(params.with_frame_gap(0), Err(CommandError::ZeroFrameGap));
    }

    #[test]
    fn command_error_display() {
        let err = CommandError::ConfThresOutOfRange(2.0);
        assert!(err.to_string().contains("[0, 1]"));
    }
}
