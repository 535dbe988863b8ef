//! Refresh cadence.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::Local;
use tokio::time::Instant;

use crate::{Error, Result};

/// Default cadence between cycles.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// When cycles run.
///
/// Parsed from `<n>s`, `<n>m`, `<n>h`, or a cron expression. Five-field cron
/// expressions (`*/5 * * * *`) get a leading seconds field of `0`.
#[derive(Debug, Clone)]
pub enum RefreshSchedule {
    /// Fixed period. Cycles that overrun skip the ticks they missed.
    Every(Duration),
    /// Cron expression evaluated in local time.
    Cron {
        expression: String,
        schedule: cron::Schedule,
    },
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self::Every(DEFAULT_REFRESH_INTERVAL)
    }
}

impl PartialEq for RefreshSchedule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Every(a), Self::Every(b)) => a == b,
            (Self::Cron { expression: a, .. }, Self::Cron { expression: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for RefreshSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every(period) => write!(f, "every {}s", period.as_secs()),
            Self::Cron { expression, .. } => write!(f, "cron '{expression}'"),
        }
    }
}

impl FromStr for RefreshSchedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::config("refresh schedule is empty"));
        }

        if let Some(period) = parse_period(s)? {
            return Ok(Self::Every(period));
        }

        let expression = match s.split_whitespace().count() {
            5 => format!("0 {s}"),
            6 | 7 => s.to_string(),
            _ => {
                return Err(Error::config(format!(
                    "refresh schedule '{s}' is neither a period like '5m' nor a cron expression"
                )));
            }
        };
        let schedule = cron::Schedule::from_str(&expression)
            .map_err(|e| Error::config(format!("invalid cron expression '{s}': {e}")))?;

        Ok(Self::Cron {
            expression: s.to_string(),
            schedule,
        })
    }
}

/// `Ok(None)` when `s` is not period-shaped at all.
fn parse_period(s: &str) -> Result<Option<Duration>> {
    let Some(unit) = s.chars().last() else {
        return Ok(None);
    };
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        _ => return Ok(None),
    };
    let number = &s[..s.len() - 1];
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }

    let count: u64 = number
        .parse()
        .map_err(|_| Error::config(format!("refresh period '{s}' is out of range")))?;
    if count == 0 {
        return Err(Error::config("refresh period must be positive"));
    }
    Ok(Some(Duration::from_secs(count.saturating_mul(multiplier))))
}

impl RefreshSchedule {
    /// Next instant a cycle should start.
    ///
    /// `previous` is the last planned start, `None` before the first cycle.
    /// Returns `None` when a cron schedule has no upcoming time.
    pub fn next_fire(&self, previous: Option<Instant>, now: Instant) -> Option<Instant> {
        match self {
            Self::Every(period) => {
                let mut next = previous.map_or(now + *period, |prev| prev + *period);
                while next <= now {
                    next += *period;
                }
                Some(next)
            }
            Self::Cron { schedule, .. } => {
                let local_now = Local::now();
                let upcoming = schedule.after(&local_now).next()?;
                let wait = (upcoming - local_now).to_std().unwrap_or(Duration::ZERO);
                Some(now + wait)
            }
        }
    }
}
