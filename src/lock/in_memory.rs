use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::{LeaseToken, Lock, LockError, LockManager};

struct Holder {
    token: LeaseToken,
    expires_at: Instant,
}

#[derive(Default)]
struct LockState {
    holder: Option<Holder>,
    last_token: u64,
}

impl LockState {
    fn is_free(&self, now: Instant) -> bool {
        match &self.holder {
            None => true,
            Some(holder) => holder.expires_at <= now,
        }
    }

    fn grant(&mut self, now: Instant, lease: Duration) -> LeaseToken {
        self.last_token += 1;
        let token = LeaseToken(self.last_token);
        // An overflowing lease is treated as "until released".
        let expires_at = now
            .checked_add(lease)
            .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365));
        self.holder = Some(Holder { token, expires_at });
        token
    }
}

/// In-memory leased lock backed by `Mutex<LockState>` + `Condvar`.
///
/// A holder whose lease ran out is silently replaced by the next caller;
/// its later `release` returns `Ok(false)`.
pub struct InMemoryLock {
    key: String,
    state: Mutex<LockState>,
    wake: Condvar,
}

impl InMemoryLock {
    pub fn new(key: impl Into<String>) -> Self {
        InMemoryLock {
            key: key.into(),
            state: Mutex::new(LockState::default()),
            wake: Condvar::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a live (unexpired) lease currently holds the lock.
    pub fn is_held(&self) -> Result<bool, LockError> {
        let state = self
            .state
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        Ok(!state.is_free(Instant::now()))
    }
}

impl Lock for InMemoryLock {
    fn acquire(&self, wait: Duration, lease: Duration) -> Result<LeaseToken, LockError> {
        let started = Instant::now();
        let deadline = started.checked_add(wait).unwrap_or(started + Duration::from_secs(86_400));
        let mut state = self
            .state
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;

        loop {
            let now = Instant::now();
            if state.is_free(now) {
                return Ok(state.grant(now, lease));
            }
            if now >= deadline {
                return Err(LockError::Timeout {
                    key: self.key.clone(),
                    waited: now.duration_since(started),
                });
            }

            // Wake up no later than the holder's lease expiry.
            let until = state
                .holder
                .as_ref()
                .map(|holder| holder.expires_at.min(deadline))
                .unwrap_or(deadline);
            let (guard, _) = self
                .wake
                .wait_timeout(state, until.saturating_duration_since(now))
                .map_err(|e| LockError::Poisoned(e.to_string()))?;
            state = guard;
        }
    }

    fn try_acquire(&self, lease: Duration) -> Result<Option<LeaseToken>, LockError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        let now = Instant::now();
        if state.is_free(now) {
            Ok(Some(state.grant(now, lease)))
        } else {
            Ok(None)
        }
    }

    fn release(&self, token: LeaseToken) -> Result<bool, LockError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        let owned = state
            .holder
            .as_ref()
            .map(|holder| holder.token == token)
            .unwrap_or(false);
        if owned {
            state.holder = None;
            self.wake.notify_one();
        }
        Ok(owned)
    }
}

/// In-memory lock manager backed by a `HashMap<String, Arc<InMemoryLock>>`.
///
/// Lazily creates one `InMemoryLock` per unique key and returns the same
/// `Arc` for repeated lookups. Suitable for a single process; run a
/// distributed `LockManager` when several processes share one unit table.
pub struct InMemoryLockManager {
    locks: Mutex<HashMap<String, Arc<InMemoryLock>>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        InMemoryLockManager {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager for InMemoryLockManager {
    type Lock = InMemoryLock;

    fn get_lock(&self, key: &str) -> Result<Arc<InMemoryLock>, LockError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| LockError::Poisoned("lock manager map poisoned".into()))?;
        Ok(locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(InMemoryLock::new(key)))
            .clone())
    }
}
