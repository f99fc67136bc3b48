//! Named, leased mutual exclusion.
//!
//! [`Locker::with_lock`] is the only entry point the engine uses. The
//! default [`LockCoordinator`] obtains per-key [`Lock`]s from a
//! [`LockManager`]; swap the manager for a distributed one when several
//! processes share one unit table.

mod coordinator;
mod error;
mod in_memory;
#[allow(clippy::module_inception)]
mod lock;
mod lock_manager;

pub use coordinator::{InMemoryLocker, LockCoordinator, Locker};
pub use error::LockError;
pub use in_memory::{InMemoryLock, InMemoryLockManager};
pub use lock::{LeaseToken, Lock};
pub use lock_manager::LockManager;
