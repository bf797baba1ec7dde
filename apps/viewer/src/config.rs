//! Viewer configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/detstream/viewer.toml`
//! - Windows: `%APPDATA%/detstream/viewer.toml`
//!
//! Command-line flags override individual fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use detstream_protocol::StartParams;
use detstream_session::{ErrorPolicy, SessionConfig};

/// Command-line arguments.
#[derive(Debug, Default, clap::Parser)]
#[command(name = "detstream-viewer", version, about = "Stream detections from a detection service")]
pub struct Args {
    /// Path to the configuration file.
    #[arg(long, env = "DETSTREAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// WebSocket endpoint of the detection service.
    #[arg(long)]
    pub url: Option<String>,

    /// Video source passed to the service (file path or stream URL).
    #[arg(long)]
    pub source: Option<String>,

    /// Detection confidence threshold in [0, 1].
    #[arg(long)]
    pub conf_thres: Option<f64>,

    /// Analyse every Nth frame.
    #[arg(long)]
    pub frame_gap: Option<u32>,

    /// Skip stopping a previous run before starting.
    #[arg(long)]
    pub no_stop_prior: bool,
}

/// Viewer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the detection service.
    #[serde(default = "default_url")]
    pub url: String,

    /// Video source the service should analyse.
    #[serde(default)]
    pub source: String,

    /// Detection confidence threshold (service default when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf_thres: Option<f64>,

    /// Frame sampling gap (service default when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_gap: Option<u32>,

    /// Stop a possibly running previous session before starting.
    #[serde(default = "default_true")]
    pub stop_prior: bool,

    /// How long to wait for the previous session to confirm it stopped.
    #[serde(default = "default_stop_wait_ms")]
    pub stop_wait_ms: u64,

    /// Whether a server `error` message ends the session.
    #[serde(default)]
    pub error_policy: ErrorPolicy,

    /// Send `stop` to the service on Ctrl-C.
    #[serde(default = "default_true")]
    pub stop_on_cancel: bool,

    /// Directory to write frame snapshots to (disabled when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,

    /// Write every Nth decoded frame as a snapshot.
    #[serde(default = "default_snapshot_every")]
    pub snapshot_every: u64,
}

fn default_url() -> String {
    "ws://127.0.0.1:8000/ws_roi".into()
}

fn default_true() -> bool {
    true
}

fn default_stop_wait_ms() -> u64 {
    2000
}

fn default_snapshot_every() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            source: String::new(),
            conf_thres: None,
            frame_gap: None,
            stop_prior: default_true(),
            stop_wait_ms: default_stop_wait_ms(),
            error_policy: ErrorPolicy::default(),
            stop_on_cancel: default_true(),
            snapshot_dir: None,
            snapshot_every: default_snapshot_every(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the platform default
    /// location (creating it with defaults when missing).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None => {
                let path = config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    let config = Config::default();
                    config.save_to(&path)?;
                    Ok(config)
                }
            }
        }
    }

    /// Loads configuration from an explicit file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Applies command-line overrides.
    pub fn with_overrides(mut self, args: &Args) -> Self {
        if let Some(url) = &args.url {
            self.url = url.clone();
        }
        if let Some(source) = &args.source {
            self.source = source.clone();
        }
        if args.conf_thres.is_some() {
            self.conf_thres = args.conf_thres;
        }
        if args.frame_gap.is_some() {
            self.frame_gap = args.frame_gap;
        }
        if args.no_stop_prior {
            self.stop_prior = false;
        }
        self
    }

    /// Checks the configuration before any connection is made.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            anyhow::bail!("url must start with ws:// or wss://, got {}", self.url);
        }
        if self.snapshot_every == 0 {
            anyhow::bail!("snapshot_every must be at least 1");
        }
        self.start_params()
            .context("set `source` in the config file or pass --source")?;
        Ok(())
    }

    /// Builds the start command parameters.
    pub fn start_params(&self) -> anyhow::Result<StartParams> {
        let mut params = StartParams::new(self.source.clone())?;
        if let Some(conf) = self.conf_thres {
            params = params.with_conf_thres(conf)?;
        }
        if let Some(gap) = self.frame_gap {
            params = params.with_frame_gap(gap)?;
        }
        Ok(params)
    }

    /// Builds the session configuration.
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        Ok(SessionConfig {
            stop_prior: self.stop_prior,
            stop_wait: Duration::from_millis(self.stop_wait_ms),
            error_policy: self.error_policy,
            stop_on_cancel: self.stop_on_cancel,
            ..SessionConfig::new(self.start_params()?)
        })
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("detstream").join("viewer.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("detstream")
            .join("viewer.toml"))
    }
}
