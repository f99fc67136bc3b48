use std::time::Duration;

use super::LockError;

/// Proof of a held lease. Tokens increase monotonically per lock, so a
/// holder whose lease was taken over can be told apart from the new holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeaseToken(pub u64);

/// Trait for a single leased lock instance.
///
/// A lease is a fixed upper bound on how long the lock is held. Once it runs
/// out, other callers may take the lock over even if the holder never
/// released it. In-memory locks use `Mutex` + `Condvar`; distributed locks
/// might use Redis `SET NX PX`, Postgres advisory locks, etcd leases, etc.
pub trait Lock: Send + Sync {
    /// Acquire the lock, blocking for at most `wait`.
    fn acquire(&self, wait: Duration, lease: Duration) -> Result<LeaseToken, LockError>;

    /// Try to acquire the lock without blocking.
    /// Returns `Ok(None)` if another live lease holds it.
    fn try_acquire(&self, lease: Duration) -> Result<Option<LeaseToken>, LockError>;

    /// Release the lease identified by `token`.
    /// Returns `Ok(false)` if the lease had already expired and been taken over.
    fn release(&self, token: LeaseToken) -> Result<bool, LockError>;
}
