//! File logging for the plugin.
//!
//! A plugin loaded into a file manager has no usable stderr, so events go to
//! a daily rolling file:
//! - Linux: `$XDG_STATE_HOME/wsvfs/logs/` (defaults to `~/.local/state/wsvfs/logs/`)
//! - elsewhere: the platform local data directory under `logs/`

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

const LOG_FILE_NAME: &str = "wsvfs.log";

/// Keeps the non-blocking writer flushing for the life of the process.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Installs the global file subscriber.
///
/// Returns the log directory, or `None` when logging is disabled. Calling
/// it again after a successful initialisation returns the same directory
/// and changes nothing.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<&'static Path>> {
    if let Some(dir) = LOG_DIR.get() {
        return Ok(Some(dir.as_path()));
    }
    if !config.enabled {
        return Ok(None);
    }

    let log_dir = match &config.directory {
        Some(dir) => dir.clone(),
        None => default_log_directory()?,
    };
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {}", config.level))?,
    };

    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    let _ = LOG_GUARD.set(guard);
    let dir = LOG_DIR.get_or_init(|| log_dir);
    tracing::info!(
        "Plugin logging started (PID: {}), log directory: {}",
        std::process::id(),
        dir.display()
    );
    Ok(Some(dir.as_path()))
}

fn default_log_directory() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Some(state_dir) =
            directories::BaseDirs::new().and_then(|d| d.state_dir().map(Path::to_path_buf))
        {
            return Ok(state_dir.join("wsvfs").join("logs"));
        }
    }

    let dirs = directories::ProjectDirs::from("cz", "webshare", "wsvfs")
        .context("Could not determine a log directory")?;
    Ok(dirs.data_local_dir().join("logs"))
}
