//! Tracing setup.
//!
//! Console plus a daily rolling file, both stamped in local time. The filter
//! sits behind a reload layer so the API can change it at runtime. Rolled
//! files older than a week are removed by a background task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use crate::utils::fs;
use crate::{Error, Result};

/// Used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str =
    "quota_monitor=info,session_cookies=info,sqlx=warn,tower_http=info";

/// Rolled files are named `quota-monitor.log.YYYY-MM-DD`.
const LOG_FILE_PREFIX: &str = "quota-monitor.log";

const LOG_RETENTION_DAYS: i64 = 7;
const RETENTION_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Handle on the running subscriber.
pub struct LoggingConfig {
    handle: FilterHandle,
    log_dir: PathBuf,
}

impl LoggingConfig {
    /// Current filter directive, e.g. `quota_monitor=info,sqlx=warn`.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Swap the filter. An unparsable directive leaves the current one in place.
    pub fn set_filter(&self, directive: &str) -> Result<()> {
        let filter = EnvFilter::try_new(directive)
            .map_err(|e| Error::validation(format!("Invalid filter directive: {e}")))?;
        self.handle
            .reload(filter)
            .map_err(|e| Error::Other(format!("Failed to reload filter: {e}")))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Sweep old log files now and then once a day until cancelled.
    pub fn start_retention_cleanup(self: &Arc<Self>, cancel_token: CancellationToken) {
        let log_dir = self.log_dir.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RETENTION_CHECK_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS).await {
                    warn!(error = %e, log_dir = %log_dir.display(), "Log retention sweep failed");
                }
            }
            debug!("Log retention task stopped");
        });
    }
}

/// Date of a rolled log file, or `None` for anything else in the directory.
fn rolled_file_date(file_name: &str) -> Option<NaiveDate> {
    let date = file_name
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_prefix('.')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Remove rolled files dated before `retention_days` ago. Returns how many
/// were removed.
async fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<usize> {
    let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).date_naive();
    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let expired = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(rolled_file_date)
            .is_some_and(|date| date < cutoff);
        if !expired || !path.is_file() {
            continue;
        }

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to delete old log file");
        } else {
            removed += 1;
        }
    }

    if removed > 0 {
        info!(count = removed, "Removed expired log files");
    }
    Ok(removed)
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop. Hold it until exit.
pub fn init_logging(log_dir: &str) -> Result<(Arc<LoggingConfig>, WorkerGuard)> {
    let log_dir = PathBuf::from(log_dir);
    fs::ensure_dir_all_sync_with_op("creating log directory", &log_dir)?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX));

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(LocalTimer)
                .with_writer(file_writer),
        )
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to install tracing subscriber: {e}")))?;

    Ok((Arc::new(LoggingConfig { handle, log_dir }), guard))
}

/// Log targets worth tuning, for the logging API.
pub fn available_modules() -> Vec<(&'static str, &'static str)> {
    vec![
        ("quota_monitor", "Main application"),
        ("quota_monitor::quota", "Quota client and refresh orchestration"),
        ("quota_monitor::scheduler", "Refresh scheduler"),
        ("session_cookies", "Cookie parsing and rotation"),
        ("sqlx", "Database queries"),
        ("reqwest", "HTTP requests"),
        ("tower_http", "HTTP middleware"),
    ]
}
