use std::time::Duration;

use thiserror::Error;

/// Error type for lock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The underlying lock primitive was poisoned (e.g. a thread panicked while holding it).
    #[error("lock poisoned: {0}")]
    Poisoned(String),
    /// The lock was not acquired within the wait budget.
    #[error("timed out after {waited:?} waiting for lock {key}")]
    Timeout { key: String, waited: Duration },
    /// A distributed backend failed to answer.
    #[error("lock backend error: {0}")]
    Backend(String),
}
