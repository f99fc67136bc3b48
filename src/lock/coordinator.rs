use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{InMemoryLockManager, LeaseToken, Lock, LockError, LockManager};

/// Runs a closure inside a named critical section.
///
/// The body is never invoked if the lock cannot be acquired within `wait`.
/// The lease is not renewed while the body runs; a body that outlives it may
/// lose exclusivity.
pub trait Locker: Send + Sync {
    fn with_lock<T, E, F>(&self, key: &str, wait: Duration, lease: Duration, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<LockError>;
}

/// `Locker` over any [`LockManager`].
pub struct LockCoordinator<M> {
    manager: M,
}

/// Single-process locker.
pub type InMemoryLocker = LockCoordinator<InMemoryLockManager>;

impl<M> LockCoordinator<M> {
    pub fn new(manager: M) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }
}

impl LockCoordinator<InMemoryLockManager> {
    pub fn in_memory() -> Self {
        Self::new(InMemoryLockManager::new())
    }
}

impl Default for LockCoordinator<InMemoryLockManager> {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Releases the lease on drop, so a panicking body still frees the lock.
struct LeaseGuard<'a, L: Lock> {
    lock: &'a L,
    key: &'a str,
    token: LeaseToken,
    acquired_at: Instant,
    lease: Duration,
}

impl<L: Lock> Drop for LeaseGuard<'_, L> {
    fn drop(&mut self) {
        let held = self.acquired_at.elapsed();
        match self.lock.release(self.token) {
            Ok(true) => debug!(key = self.key, held_ms = held.as_millis() as u64, "lock released"),
            Ok(false) => warn!(
                key = self.key,
                held_ms = held.as_millis() as u64,
                lease_ms = self.lease.as_millis() as u64,
                "lease expired before release, exclusivity may have been lost"
            ),
            Err(err) => warn!(key = self.key, error = %err, "failed to release lock"),
        }
    }
}

impl<M: LockManager> Locker for LockCoordinator<M> {
    fn with_lock<T, E, F>(&self, key: &str, wait: Duration, lease: Duration, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<LockError>,
    {
        let lock = self.manager.get_lock(key)?;
        let token = lock.acquire(wait, lease).map_err(|err| {
            if let LockError::Timeout { waited, .. } = &err {
                warn!(key, waited_ms = waited.as_millis() as u64, "lock acquisition timed out");
            }
            err
        })?;
        debug!(key, token = token.0, "lock acquired");

        let _guard = LeaseGuard {
            lock: lock.as_ref(),
            key,
            token,
            acquired_at: Instant::now(),
            lease,
        };
        body()
    }
}
