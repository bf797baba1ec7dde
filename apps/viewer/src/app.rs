//! Application orchestrator: wires config, sinks and the session together.

use tokio_util::sync::CancellationToken;

use detstream_session::{SessionDriver, SessionOutcome};

use crate::config::Config;
use crate::sinks::{LogReport, SnapshotDisplay};

/// Runs one session until it ends or Ctrl-C is pressed.
pub async fn run(config: Config) -> anyhow::Result<SessionOutcome> {
    let cancel = CancellationToken::new();

    let display = SnapshotDisplay::new(config.snapshot_dir.clone(), config.snapshot_every);
    let driver = SessionDriver::new(config.session_config()?, display, LogReport::default())
        .with_cancel(cancel.clone());

    let signal = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                cancel.cancel();
            }
        })
    };

    tracing::info!(url = %config.url, "connecting");
    let result = driver.connect_and_run(&config.url).await;
    signal.abort();

    let outcome = result?;
    tracing::info!(
        state = %outcome.final_state,
        frames = outcome.stats.frames_shown,
        failed_frames = outcome.stats.frames_failed,
        analytics = outcome.stats.analytics_frames,
        issues = outcome.stats.issues,
        "session summary"
    );
    Ok(outcome)
}
