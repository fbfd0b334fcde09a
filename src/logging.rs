//! File-backed logging. The TUI owns the terminal, so log output goes to
//! a rolling file under the config directory instead of stdout.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Initialize the global logger. Level defaults to `info`, overridable
/// via `RUST_LOG`.
pub fn init<P: AsRef<Path>>(log_dir: P) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "chat.log");

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(file_appender)
        .with_ansi(false)
        .try_init();
}
