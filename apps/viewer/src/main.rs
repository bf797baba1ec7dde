//! detstream viewer entry point.

mod app;
mod config;
mod sinks;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting detstream viewer"
    );

    let args = config::Args::parse();
    let config = config::Config::load(args.config.as_deref())?.with_overrides(&args);
    config.validate()?;
    tracing::info!(url = %config.url, source = %config.source, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(app::run(config))?;

    tracing::info!(exit = ?outcome.exit, "viewer shut down cleanly");
    Ok(())
}
