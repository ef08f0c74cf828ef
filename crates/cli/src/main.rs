use std::process::ExitCode;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;
use vestry_core::config::{AppConfig, LoadOptions, LogFormat};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.logging.level)
        .map_err(|error| anyhow!("invalid log filter `{}`: {error}", config.logging.level))?;
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|error| anyhow!("failed to install tracing subscriber: {error}"))
}

fn main() -> Result<ExitCode> {
    // Commands report their own config errors; logging falls back to defaults.
    let config = AppConfig::load(LoadOptions::default()).unwrap_or_default();
    init_logging(&config)?;

    Ok(vestry_cli::run())
}
