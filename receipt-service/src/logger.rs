//! Logging Infrastructure
//!
//! Console output on stderr (stdout is reserved for previews), plus an
//! optional daily rotating file when a log directory is configured.

use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDate};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Rolling file prefix; files are named `receipt-print.YYYY-MM-DD`
pub const LOG_FILE_PREFIX: &str = "receipt-print";

/// Days a rotated log file is kept
pub const LOG_RETENTION_DAYS: i64 = 14;

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Examples
/// ```no_run
/// // console only
/// receipt_service::logger::init_logger_with_file("debug", None)?;
///
/// // console + ./logs/receipt-print.YYYY-MM-DD
/// receipt_service::logger::init_logger_with_file("info", Some("./logs"))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger_with_file(level: &str, log_dir: Option<&str>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = match log_dir {
        Some(dir) => {
            let dir = Path::new(dir);
            fs::create_dir_all(dir)?;
            cleanup_old_logs(dir, LOG_RETENTION_DAYS)?;

            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(appender))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

/// Delete rotated log files older than `days`
///
/// Returns the number of files removed. Files that do not follow the
/// rolling name pattern are left alone.
pub fn cleanup_old_logs(log_dir: &Path, days: i64) -> anyhow::Result<usize> {
    let cutoff = Local::now().date_naive() - chrono::Duration::days(days);
    let prefix = format!("{}.", LOG_FILE_PREFIX);
    let mut removed = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // receipt-print.YYYY-MM-DD
        if let Some(date) = name
            .strip_prefix(&prefix)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            && date < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
            removed += 1;
        }
    }

    Ok(removed)
}
