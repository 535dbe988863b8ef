//! Process configuration loaded from the environment.

use std::time::Duration;

use crate::scheduler::RefreshSchedule;
use crate::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:quota-monitor.db?mode=rwc";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 8000;
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_QUOTA_BASE_URL: &str = "https://modelscope.cn/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
    pub log_dir: String,
    pub quota_base_url: String,
    pub request_timeout: Duration,
    pub refresh_schedule: RefreshSchedule,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_API_PORT,
            log_dir: DEFAULT_LOG_DIR.to_string(),
            quota_base_url: DEFAULT_QUOTA_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_schedule: RefreshSchedule::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    ///
    /// Call `dotenvy::dotenv()` beforehand to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(url) = get("DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(addr) = get("API_BIND_ADDRESS") {
            config.bind_address = addr;
        }

        if let Some(port) = get("API_PORT") {
            config.port = port
                .parse()
                .map_err(|_| Error::config(format!("API_PORT must be a port number, got '{port}'")))?;
        }

        if let Some(dir) = get("LOG_DIR") {
            config.log_dir = dir;
        }

        if let Some(base) = get("QUOTA_BASE_URL") {
            config.quota_base_url = base.trim_end_matches('/').to_string();
        }

        if let Some(secs) = get("QUOTA_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                Error::config(format!(
                    "QUOTA_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{secs}'"
                ))
            })?;
            if secs == 0 {
                return Err(Error::config("QUOTA_REQUEST_TIMEOUT_SECS must be positive"));
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(schedule) = get("REFRESH_SCHEDULE") {
            config.refresh_schedule = schedule.parse()?;
        }

        Ok(config)
    }
}
