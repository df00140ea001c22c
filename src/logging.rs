//! Console and log-file output.
//!
//! Every run mirrors its console output into a timestamped,
//! append-only file so a failed deployment can be inspected after
//! the terminal is gone.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{DeployError, DeployResult};

/// Keeps the file writer flushing until dropped. Hold it for the
/// lifetime of the process.
pub struct LogHandle {
    pub path: PathBuf,
    _guard: WorkerGuard,
}

/// File name for a run started now, e.g. `deploy_20260101_120000.log`.
#[must_use]
pub fn log_file_name() -> String {
    format!("deploy_{}.log", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// Install the global subscriber: human-readable progress on
/// stderr plus the same events in `log_dir/<log_file_name()>`.
/// `RUST_LOG` overrides the default `info` level.
pub fn init(log_dir: &Path, verbose: bool) -> DeployResult<LogHandle> {
    std::fs::create_dir_all(log_dir)?;

    let file_name = log_file_name();
    let path = log_dir.join(&file_name);
    let appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_target(false)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| DeployError::Other(format!("failed to initialize logging: {e}")))?;

    Ok(LogHandle {
        path,
        _guard: guard,
    })
}
