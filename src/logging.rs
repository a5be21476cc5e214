//! Tracing subscriber setup for the binary
//!
//! Human-readable output always goes to stderr. With a log file, the same
//! events are also written there as JSON lines through a non-blocking writer.

use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// The returned guard flushes the log file when dropped and must be kept
/// alive until the program exits.
pub fn init(verbose: bool, log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// `-v` forces debug; otherwise `RUST_LOG` applies, defaulting to info
fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new(default_directive(verbose));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

fn file_writer(path: &Path) -> io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log file path has no file name"))?;

    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::never(dir, file_name);

    Ok(tracing_appender::non_blocking(appender))
}
