//! Logging setup.
//!
//! Logs go to systemd-journald on Linux when it is reachable, otherwise to a
//! daily rolling file. Passing `verbose` also mirrors them to stderr.
//!
//! The level is read from `WALLSORT_LOG` (`debug`, `info`, `warn`, `error`),
//! defaulting to `info`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "WALLSORT_LOG";

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wallsort")
        .join("logs")
}

/// Initialise the global subscriber. Call once at startup.
pub fn init(log_dir: Option<PathBuf>, verbose: bool) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(journald_layer)
                .with(verbose.then(|| fmt::layer().with_writer(std::io::stderr).with_target(false)))
                .try_init()?;

            tracing::debug!("Logging to journald");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "wallsort.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(verbose.then(|| fmt::layer().with_writer(std::io::stderr).with_target(false)))
        .try_init()?;

    tracing::debug!("Logging to {}", log_dir.display());
    Ok(())
}
