use std::sync::Mutex;

use event_emitter_rs::EventEmitter;

use super::{ChangeNotifier, NotifyError, StockChange};

const EVENT: &str = "stock.changed";

/// Delivers stock changes to in-process listeners.
///
/// Listeners run on the emitter's own threads, so they observe changes
/// shortly after `publish` returns rather than inline.
pub struct EmitterNotifier {
    emitter: Mutex<EventEmitter>,
}

impl EmitterNotifier {
    pub fn new() -> Self {
        Self {
            emitter: Mutex::new(EventEmitter::new()),
        }
    }

    /// Register a listener for every stock change.
    pub fn on<F>(&self, listener: F)
    where
        F: Fn(StockChange) + Send + Sync + 'static,
    {
        if let Ok(mut emitter) = self.emitter.lock() {
            emitter.on(EVENT, listener);
        }
    }
}

impl Default for EmitterNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier for EmitterNotifier {
    fn publish(&self, change: &StockChange) -> Result<(), NotifyError> {
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| NotifyError::Delivery("emitter poisoned".into()))?;
        emitter.emit(EVENT, change.clone());
        Ok(())
    }
}
