//! Retry/backoff policy for failed operations.
//!
//! Delays come from a fixed ascending table indexed by attempt number; the
//! last entry is reused once the table is exhausted. No jitter: observed
//! client behavior is deterministic and the tests rely on it.

use std::time::Duration;

use ordersync_domain::BACKOFF_SCHEDULE;

/// What the dispatcher should do with an operation after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Persist the bumped attempt count and re-drain after the delay.
    RetryAfter(Duration),
    /// Attempt limit reached; park the row as terminal `failed`.
    GiveUp,
}

/// Fixed-table retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { schedule: BACKOFF_SCHEDULE.to_vec() }
    }
}

impl RetryPolicy {
    /// Policy with a custom schedule. Tests use millisecond tables so the
    /// full exhaustion path runs quickly.
    pub fn with_schedule(schedule: Vec<Duration>) -> Self {
        let schedule =
            if schedule.is_empty() { BACKOFF_SCHEDULE.to_vec() } else { schedule };
        Self { schedule }
    }

    /// Decide the next step given the attempt count *after* incrementing
    /// for the failure that just happened.
    pub fn decide(&self, attempt: i32, attempt_limit: i32) -> RetryDecision {
        if attempt >= attempt_limit {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay_for_attempt(attempt))
    }

    /// Delay for a given attempt count (1-based), clamped to the last
    /// table entry.
    pub fn delay_for_attempt(&self, attempt: i32) -> Duration {
        let index = usize::try_from(attempt.max(1) - 1).unwrap_or(0).min(self.schedule.len() - 1);
        self.schedule[index]
    }
}
