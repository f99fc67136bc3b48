//! In-memory stock-change queue for tests and single-process consumers.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::{Event, PublishError, Publisher, StockChange, STOCK_CHANGED};

/// Thread-safe in-memory event log with a per-subscriber read position.
///
/// ## Example
///
/// ```
/// use unit_reserve::notify::{Event, InMemoryQueue, Publisher};
///
/// let queue = InMemoryQueue::new();
/// queue.publish(Event::new("evt-1", "stock.changed", vec![])).unwrap();
///
/// let consumer = queue.new_subscriber();
/// assert_eq!(consumer.poll(10).unwrap().event_type, "stock.changed");
/// assert!(consumer.poll(10).is_none());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    log: Arc<RwLock<Vec<Event>>>,
    position: Arc<Mutex<usize>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscriber sharing the same log with its own read position.
    pub fn new_subscriber(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
            position: Arc::new(Mutex::new(0)),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Decode every stock-change event in publication order, skipping
    /// payloads that do not decode.
    pub fn stock_changes(&self) -> Vec<StockChange> {
        self.events()
            .iter()
            .filter(|e| e.event_type == STOCK_CHANGED)
            .filter_map(|e| e.decode().ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Next unread event, waiting up to `timeout_ms`.
    pub fn poll(&self, timeout_ms: u64) -> Option<Event> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            {
                let log = self.log.read().unwrap_or_else(PoisonError::into_inner);
                let mut pos = self.position.lock().unwrap_or_else(PoisonError::into_inner);

                if *pos < log.len() {
                    let event = log[*pos].clone();
                    *pos += 1;
                    return Some(event);
                }
            }

            if Instant::now() >= deadline {
                return None;
            }

            // Small sleep to avoid busy-waiting
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Publisher for InMemoryQueue {
    fn publish(&self, event: Event) -> Result<(), PublishError> {
        self.log
            .write()
            .map_err(|_| PublishError::Rejected("queue poisoned".into()))?
            .push(event);
        Ok(())
    }
}
