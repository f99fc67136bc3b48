//! Bounded retry with exponential backoff for optimistic-concurrency conflicts.
//!
//! Only [`ReservationError::VersionConflict`] is retried: it means another
//! writer changed a unit between this body's read and its write, so running
//! the body again against fresh data can succeed. Every other error
//! propagates on the spot.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use unit_reserve::retry::{retry_on_conflict, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(1));
//! let value = retry_on_conflict(&policy, || Ok(42)).unwrap();
//! assert_eq!(value, 42);
//! ```

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::ReservationError;

/// Retry policy configuration.
///
/// # Default Values
///
/// - `max_attempts`: 3 (total invocations, including the first)
/// - `base_delay`: 50ms
/// - `max_delay`: 2 seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of times the body may run.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each time.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retrying after the `attempt`-th failure (0-based):
    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Run `operation`, re-running it on version conflicts.
///
/// Returns [`ReservationError::ConcurrencyConflict`] once `max_attempts`
/// invocations have all conflicted.
pub fn retry_on_conflict<T, F>(policy: &RetryPolicy, mut operation: F) -> Result<T, ReservationError>
where
    F: FnMut() -> Result<T, ReservationError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(value) => {
                if attempt > 0 {
                    info!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err @ ReservationError::VersionConflict { .. }) => {
                attempt += 1;
                if attempt >= max_attempts {
                    error!(attempts = attempt, error = %err, "optimistic retries exhausted");
                    return Err(ReservationError::ConcurrencyConflict { attempts: attempt });
                }

                let delay = policy.delay_for_attempt(attempt - 1);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "version conflict, retrying"
                );
                thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }
}
