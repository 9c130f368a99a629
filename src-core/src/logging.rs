//! Logging setup and platform-specific log directory resolution.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Returns the platform-appropriate directory for log files.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_STATE_HOME/canvasrec/logs` or `~/.local/state/canvasrec/logs` |
/// | Windows | `%LOCALAPPDATA%\canvasrec\canvasrec\logs` |
/// | macOS and others | local data dir `/logs` |
pub fn log_dir() -> Option<PathBuf> {
    let base = directories::ProjectDirs::from("", "", "canvasrec")?;
    #[cfg(target_os = "linux")]
    {
        Some(
            base.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| base.data_local_dir().join("state"))
                .join("logs"),
        )
    }
    #[cfg(not(target_os = "linux"))]
    {
        Some(base.data_local_dir().join("logs"))
    }
}

/// Initialize logging with `RUST_LOG` env var support.
///
/// Writes human-readable output to stderr and, when a log directory is
/// available, daily-rolling files. The returned guard must be kept
/// alive for the file writer to flush.
pub fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_writer = log_dir().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        Some(tracing_appender::rolling::daily(dir, "canvasrec.log"))
    });

    match file_writer {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            None
        }
    }
}
