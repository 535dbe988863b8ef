//! Consecutive refresh failure tracking per account.

use std::sync::atomic::{AtomicI32, Ordering};

use chrono::{DateTime, Datelike, Utc};
use dashmap::DashMap;

use super::types::FailureKind;

/// Streaks not extended for this long are forgotten.
const MAX_AGE_DAYS: i64 = 7;

/// Current failure streak of an account.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureInfo {
    pub count: u32,
    pub first_failure: DateTime<Utc>,
    pub last_failure: DateTime<Utc>,
    pub last_kind: FailureKind,
    pub last_error: String,
}

/// Counts consecutive failed refreshes per account. A success clears the
/// streak. Kept in memory only, so a restart starts every account at zero.
#[derive(Default)]
pub struct RefreshFailureTracker {
    streaks: DashMap<String, FailureInfo>,
    /// Day (from the common era) of the last prune. Pruning runs lazily, at
    /// most once a day.
    pruned_on: AtomicI32,
}

impl RefreshFailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune_stale(&self) {
        let now = Utc::now();
        let today = now.date_naive().num_days_from_ce();
        let previous = self.pruned_on.swap(today, Ordering::AcqRel);
        if previous == today {
            return;
        }

        let cutoff = now - chrono::Duration::days(MAX_AGE_DAYS);
        self.streaks.retain(|_, info| info.last_failure >= cutoff);
    }

    /// Extend the streak of `account_id` and return its new length.
    pub fn record_failure(&self, account_id: &str, kind: FailureKind, error: &str) -> u32 {
        self.prune_stale();

        let now = Utc::now();
        let mut info = self
            .streaks
            .entry(account_id.to_string())
            .or_insert_with(|| FailureInfo {
                count: 0,
                first_failure: now,
                last_failure: now,
                last_kind: kind,
                last_error: String::new(),
            });
        info.count += 1;
        info.last_failure = now;
        info.last_kind = kind;
        info.last_error = error.to_string();
        info.count
    }

    pub fn clear(&self, account_id: &str) {
        self.streaks.remove(account_id);
    }

    pub fn failure_count(&self, account_id: &str) -> u32 {
        self.get_failure_info(account_id)
            .map_or(0, |info| info.count)
    }

    pub fn get_failure_info(&self, account_id: &str) -> Option<FailureInfo> {
        self.prune_stale();
        self.streaks.get(account_id).map(|info| info.clone())
    }
}
