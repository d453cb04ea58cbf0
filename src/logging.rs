//! Library-level logging init (§10.1). Grounded on the donor's
//! `main::init_tracing_if_requested`: a non-blocking file appender behind
//! `tracing-appender`, an `EnvFilter` level gate, no console layer so stdout
//! stays clean for the CLI's own output. Opt-in rather than automatic, so
//! the engine stays usable as a library without forcing a global subscriber.

use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Initializes a file-only `tracing` subscriber writing to
/// `<log_dir>/debug.log`. `debug` selects `debug` level filtering over the
/// default `warn`. Returns the `WorkerGuard` the caller must keep alive for
/// the duration of the process; dropping it stops the background writer and
/// may lose buffered log lines. Returns `None` if the log file could not be
/// opened, in which case no tracing output is emitted.
pub fn init(log_dir: Option<PathBuf>, debug: bool) -> Option<WorkerGuard> {
    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    if std::fs::create_dir_all(&log_dir).is_err() {
        return None;
    }
    let log_path = log_dir.join("debug.log");
    let level = if debug { "debug" } else { "warn" };

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false).with_filter(EnvFilter::new(level));
            tracing_subscriber::registry().with(file_layer).init();
            Some(guard)
        }
        Err(e) => {
            eprintln!("warning: could not open debug log at {}: {}", log_path.display(), e);
            None
        }
    }
}

fn default_log_dir() -> PathBuf {
    match crate::config::Config::storage_dir() {
        Some(dir) => dir.join("logs"),
        None => PathBuf::from(".sftpcp").join("logs"),
    }
}
