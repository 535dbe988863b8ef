//! Quota polling: remote client, session checks and the refresh orchestrator.

pub mod client;
pub mod service;
pub mod tracker;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{ModelScopeClient, QuotaClient};
pub use service::{AccountRefresher, QuotaRefreshService};
pub use tracker::{FailureInfo, RefreshFailureTracker};
pub use types::{
    FailureKind, FetchResult, QuotaFailure, QuotaOutcome, SessionTestResult, ValidationResult,
};
pub use validation::{REQUIRED_COOKIES, test_session, validate_format};
