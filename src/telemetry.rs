//! Logging setup
//!
//! One `tracing` subscriber: an `EnvFilter` (`RUST_LOG` wins over the
//! configured level), a stdout layer (JSON when configured) and a plain-text
//! layer appending to `<dir>/stencil.log`.

use crate::config::LogSettings;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_NAME: &str = "stencil.log";

/// Create the log directory and open the log file for appending
pub fn open_log_file(dir: &Path) -> Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    Ok((path, file))
}

/// Install the global subscriber
///
/// Fails when the log directory cannot be created or a subscriber is
/// already installed.
pub fn init(settings: &LogSettings) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .with_context(|| format!("invalid log level '{}'", settings.level))?;

    let (path, file) = open_log_file(&settings.dir)?;

    let json = settings.json;
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| fmt::layer().json().flatten_event(true)))
        .with((!json).then(|| fmt::layer()))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!(log_file = %path.display(), "logging initialized");
    Ok(())
}
