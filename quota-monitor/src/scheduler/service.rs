//! Refresh scheduler service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::schedule::RefreshSchedule;
use crate::quota::AccountRefresher;

/// Tally of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// Refreshes that produced a snapshot.
    pub succeeded: usize,
    /// Refreshes that reported a failure outcome.
    pub failed: usize,
    /// Refreshes that errored unexpectedly.
    pub errored: usize,
}

impl CycleSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.errored
    }
}

/// Scheduler state for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub schedule: Option<String>,
    pub last_cycle: Option<CycleSummary>,
}

/// Runs refresh cycles over all active accounts.
pub struct RefreshScheduler {
    refresher: Arc<dyn AccountRefresher>,
    running: AtomicBool,
    schedule: Mutex<Option<RefreshSchedule>>,
    last_cycle: Mutex<Option<CycleSummary>>,
}

impl RefreshScheduler {
    pub fn new(refresher: Arc<dyn AccountRefresher>) -> Self {
        Self {
            refresher,
            running: AtomicBool::new(false),
            schedule: Mutex::new(None),
            last_cycle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Schedule of the current (or last) run loop.
    pub fn schedule(&self) -> Option<RefreshSchedule> {
        self.schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.is_running(),
            schedule: self.schedule().map(|s| s.to_string()),
            last_cycle: *self
                .last_cycle
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Refresh every active account once, sequentially.
    ///
    /// An account whose refresh errors is logged and skipped; the remaining
    /// accounts are still refreshed.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let accounts = match self.refresher.active_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(error = %e, "Failed to list accounts for refresh cycle");
                return summary;
            }
        };

        info!(accounts = accounts.len(), "Starting refresh cycle");

        for account in &accounts {
            match self.refresher.refresh(&account.id).await {
                Ok(outcome) if outcome.is_success() => summary.succeeded += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    summary.errored += 1;
                    error!(
                        account_id = %account.id,
                        account_name = %account.name,
                        error = %e,
                        "Account refresh errored, continuing cycle"
                    );
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            errored = summary.errored,
            "Refresh cycle finished"
        );
        *self
            .last_cycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(summary);
        summary
    }

    /// Start running cycles on `schedule` until the returned handle is stopped.
    ///
    /// The first cycle runs one period after start. Stopping takes effect
    /// between cycles and never interrupts one in progress.
    pub fn start(self: &Arc<Self>, schedule: RefreshSchedule) -> SchedulerHandle {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Refresh scheduler started while another run loop is active");
        }
        *self.schedule.lock().unwrap_or_else(PoisonError::into_inner) = Some(schedule.clone());

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let scheduler = Arc::clone(self);

        let task = tokio::spawn(async move {
            info!(schedule = %schedule, "Refresh scheduler started");

            let mut planned: Option<Instant> = None;
            loop {
                let Some(next) = schedule.next_fire(planned, Instant::now()) else {
                    warn!(schedule = %schedule, "Schedule has no upcoming time, stopping");
                    break;
                };
                planned = Some(next);

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep_until(next) => {}
                }

                // Not raced against cancellation: a started cycle completes.
                scheduler.run_cycle().await;

                if token.is_cancelled() {
                    break;
                }
            }

            scheduler.running.store(false, Ordering::SeqCst);
            info!("Refresh scheduler stopped");
        });

        SchedulerHandle { cancel_token, task }
    }
}

/// Handle to a running scheduler loop.
///
/// Dropping the handle does not stop the loop.
pub struct SchedulerHandle {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Prevent future cycles. A cycle already running completes.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Stop and wait for the loop to exit, including any in-flight cycle.
    pub async fn stop_and_wait(self) {
        self.stop();
        if let Err(e) = self.task.await {
            error!(error = %e, "Refresh scheduler task ended abnormally");
        }
    }
}
