//! Logging infrastructure.
//!
//! This module provides:
//! - Process-wide `tracing` setup, to stderr or to a log file
//! - Per-run loggers with file + sink output
//! - Compact mode with progress filtering
//! - Tail buffer and head/tail snipping for tool output
//!
//! # Example
//!
//! ```no_run
//! use relay_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("worker1-clip", "/path/to/logs", LogConfig::default(), None)
//!     .unwrap();
//!
//! logger.phase("Transform");
//! logger.command("ffmpeg -i clip.mp4 -y clip.worker1.mp4");
//! logger.progress(50);
//! logger.success("Stage completed");
//! ```

mod job_logger;
mod types;

use std::io;
use std::path::Path;

pub use job_logger::{sanitize_filename, JobLogger, JobLoggerBuilder, SNIP_KEEP, SNIP_THRESHOLD};
pub use types::{LogConfig, LogLevel, LogSink, MessagePrefix};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name of the process-wide log inside the logs folder.
pub const PROCESS_LOG_FILE: &str = "relay.log";

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_filter()))
}

/// Initialize the global tracing subscriber writing to stderr.
///
/// Respects `RUST_LOG`, falling back to `default_level`. Call once at startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(env_filter(default_level))
        .init();
}

/// Initialize the global tracing subscriber writing to stderr and to
/// `<logs_dir>/relay.log`.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
pub fn init_tracing_with_file(default_level: LogLevel, logs_dir: &Path) -> io::Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;
    let appender = tracing_appender::rolling::never(logs_dir, PROCESS_LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(env_filter(default_level))
        .init();

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
