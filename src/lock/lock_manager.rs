use std::sync::Arc;

use super::{Lock, LockError};

/// Factory trait for obtaining per-key locks.
///
/// The reservation engine asks for one lock per variant. The default
/// `InMemoryLockManager` stores locks in a `HashMap`; distributed
/// implementations map the key onto a Redis key, advisory lock id, etc.
pub trait LockManager: Send + Sync {
    /// The concrete lock type returned by this manager.
    type Lock: Lock;

    /// Get (or create) a lock for the given key.
    ///
    /// Repeated calls with the same `key` must return the same logical lock
    /// (i.e. the same `Arc` for in-memory, or the same distributed key).
    fn get_lock(&self, key: &str) -> Result<Arc<Self::Lock>, LockError>;
}
