//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Account, AccountStats};
use crate::quota::QuotaOutcome;
use crate::scheduler::SchedulerStatus;

/// Account as shown to API clients. The session itself is never returned.
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub name: String,
    pub session_length: usize,
    pub is_active: bool,
    pub latest_usage: Option<QuotaOutcome>,
    pub consecutive_failures: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountResponse {
    pub fn from_account(account: Account, consecutive_failures: u32) -> Self {
        Self {
            session_length: account.session.len(),
            id: account.id,
            name: account.name,
            is_active: account.is_active,
            latest_usage: account.snapshot,
            consecutive_failures,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    /// Raw cookie header copied from a logged-in browser.
    pub cookies: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAccountRequest {
    pub cookies: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub data: QuotaOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub components: Vec<ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<SchedulerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<AccountStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogModuleInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogFilterResponse {
    pub filter: String,
    pub available_modules: Vec<LogModuleInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}
