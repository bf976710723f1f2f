//! Logging setup for rolecall using tracing.
//!
//! Events go to a daily `rolecall.log` file and to stderr. Stdout is left to
//! the `console`, `send` and `dump` commands.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix for the rolling log.
pub const LOG_FILE: &str = "rolecall.log";

const DEFAULT_FILTER: &str = "info,rolecall=debug";

/// Install the global subscriber, writing files under `log_dir` (or the
/// platform data dir when `None`).
///
/// Returns the flush guard and the directory in use; hold the guard until exit.
pub fn init(log_dir: Option<&Path>) -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = resolve_log_dir(log_dir)?;
    std::fs::create_dir_all(&log_dir)?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    tracing::debug!("Writing logs to {}", log_dir.join(LOG_FILE).display());

    Ok((guard, log_dir))
}

/// Directory the log files go to.
pub fn resolve_log_dir(log_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = log_dir {
        return Ok(dir.to_path_buf());
    }
    let dirs = directories::ProjectDirs::from("com", "rolecall", "rolecall")
        .ok_or_else(|| anyhow::anyhow!("Could not determine a data directory for logs"))?;

    Ok(dirs.data_dir().join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_log_dir_wins() {
        let dir = Path::new("/var/log/rolecall");
        assert_eq!(resolve_log_dir(Some(dir)).unwrap(), dir);
    }

    #[test]
    fn test_default_log_dir_is_under_data_dir() {
        if let Ok(dir) = resolve_log_dir(None) {
            assert!(dir.ends_with("logs"));
        }
    }
}
