//! Mode state machine and circuit breaker decisions.
//!
//! Everything here is a pure function of counters and timestamps so the
//! scheduler can be driven by a simulated clock in tests.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::core::types::Mode;

/// Fixed backoff applied once the circuit breaker trips.
pub const COOLING_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Decide the mode for the current iteration.
///
/// Cooling takes precedence over everything: no dispatch happens while the
/// breaker is open, even if work is available.
pub fn decide(consecutive_failures: u32, max_consecutive_failures: u32, actionable: usize) -> Mode {
    if consecutive_failures >= max_consecutive_failures {
        Mode::Cooling
    } else if actionable == 0 {
        Mode::Idle
    } else {
        Mode::Active
    }
}

/// True if a heartbeat should be emitted now.
///
/// The first heartbeat of a session is due immediately; afterwards at most one
/// per `interval`.
pub fn heartbeat_due(last: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    match last {
        None => true,
        Some(last) => elapsed(last, now) >= interval,
    }
}

/// True if the calendar day (UTC) rolled over since the last summary.
pub fn summary_due(last_day: NaiveDate, now: DateTime<Utc>, enabled: bool) -> bool {
    enabled && now.date_naive() != last_day
}

/// Non-negative wall-clock distance; a clock that moved backwards counts as zero.
pub fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or(Duration::ZERO)
}
