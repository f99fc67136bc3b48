//! Background thread that runs the expiration sweep on a fixed interval.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use super::ExpirationSweeper;
use crate::lock::Locker;
use crate::store::UnitStore;

/// Totals across every sweep the thread ran.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub sweeps: usize,
    pub released: usize,
    pub failed: usize,
}

/// Runs [`ExpirationSweeper::sweep`] immediately and then once per interval
/// until stopped.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use unit_reserve::engine::ReservationEngine;
/// use unit_reserve::store::InMemoryUnitStore;
/// use unit_reserve::sweeper::{ExpirationSweeper, SweeperThread};
///
/// let engine = Arc::new(ReservationEngine::in_memory(InMemoryUnitStore::new()));
/// let worker = SweeperThread::spawn(ExpirationSweeper::new(engine), Duration::from_millis(10));
///
/// let stats = worker.stop();
/// assert!(stats.sweeps >= 1);
/// ```
pub struct SweeperThread {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<SweepStats>>,
}

impl SweeperThread {
    pub fn spawn<S, L>(sweeper: ExpirationSweeper<S, L>, interval: Duration) -> Self
    where
        S: UnitStore + 'static,
        L: Locker + 'static,
    {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = SweepStats::default();

            loop {
                let report = sweeper.sweep();
                stats.sweeps += 1;
                stats.released += report.released();
                stats.failed += report.failed.len();
                debug!(sweep = stats.sweeps, released = report.released(), "sweep done");

                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }

            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the thread to stop and wait for it to finish.
    pub fn stop(mut self) -> SweepStats {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => SweepStats::default(),
        }
    }

    /// Signal the thread to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for SweeperThread {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
