//! Logging setup: console output, optionally daily log files.
//!
//! The library logs through the `log` facade, which is bridged to `tracing`.

use std::fs;
use std::io;
use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Base name of the log files.
const LOG_FILE_NAME: &str = "tsnames.log";

/// Initialize logging to stderr and, when `log_dir` is set, to a daily file.
///
/// The returned guard must be kept alive until the end of the program so
/// that buffered file output is flushed.
///
/// # Arguments
/// * `log_dir` - Directory where log files are stored
/// * `retention_days` - Number of days to keep log files
/// * `verbose` - Whether to enable debug-level logging
/// * `level` - Default filter when `RUST_LOG` is unset
pub fn init_logging(
    log_dir: Option<&Path>,
    retention_days: u64,
    verbose: bool,
    level: Option<&str>,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let default_level = if verbose { "debug" } else { level.unwrap_or("warn") };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(verbose)
        .with_level(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_timer(LocalTimeTimer);

    let (file_layer, guard) = match log_dir {
        Some(log_dir) => {
            fs::create_dir_all(log_dir)?;
            clean_old_logs(log_dir, retention_days)?;

            let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_timer(LocalTimeTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry().with(env_filter).with(console).with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to set default subscriber: {}", e))?;

    // Bridge log:: macros of the tsnames library to tracing
    tracing_log::LogTracer::init().map_err(|e| format!("Failed to initialize LogTracer: {}", e))?;

    Ok(guard)
}

/// Remove log files older than the specified number of days.
fn clean_old_logs(log_dir: &Path, retention_days: u64) -> io::Result<()> {
    let cutoff = Local::now() - chrono::Duration::days(retention_days as i64);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !is_log_file(&path) {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        let modified: chrono::DateTime<Local> = modified.into();
        if modified < cutoff {
            if let Err(e) = fs::remove_file(&path) {
                eprintln!("Failed to remove old log file {:?}: {}", path, e);
            }
        }
    }

    Ok(())
}

fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(LOG_FILE_NAME))
}

/// Custom timer for local time formatting in logs
#[derive(Debug, Clone, Copy)]
struct LocalTimeTimer;

impl fmt::time::FormatTime for LocalTimeTimer {
    fn format_time(&self, w: &mut fmt::format::Writer) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"))
    }
}
