//! Logging setup with journald support on Linux.
//!
//! On Linux the subscriber writes to systemd-journald when it is reachable.
//! Everywhere else, or when journald is unavailable, logs go to a daily
//! rolling file.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system.
///
/// Level is read from `PORTFOLIO_LOG` (e.g. `PORTFOLIO_LOG=debug`),
/// defaulting to `info`.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("PORTFOLIO_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .try_init()?;

            tracing::info!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "portfolio-gallery.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer flushes until the guard drops, so keep it for the process lifetime.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    tracing::info!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portfolio-gallery")
        .join("logs")
}
