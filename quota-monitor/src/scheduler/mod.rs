//! Periodic refresh of every active account.
//!
//! A cycle visits accounts one at a time so the remote endpoint never sees
//! concurrent calls from this process. A failing account is logged and the
//! cycle moves on.

mod schedule;
mod service;

pub use schedule::RefreshSchedule;
pub use service::{CycleSummary, RefreshScheduler, SchedulerHandle, SchedulerStatus};
