//! ChangeNotifier - publishes stock-level changes after a transition commits.
//!
//! Delivery is best effort. The engine logs a failing notifier and moves on;
//! it never rolls back inventory because a notification could not be sent.
//!
//! ## Adapters
//!
//! ```text
//! ReservationEngine ──publish(StockChange)──▶ ChangeNotifier
//!                                               │
//!            ┌──────────────────┬───────────────┴───────────┐
//!            ▼                  ▼                           ▼
//!      LogNotifier        BusNotifier<P>             EmitterNotifier
//!       (tracing)   (bitcode Event on a bus      (in-process listeners,
//!                    Publisher, e.g. InMemoryQueue)  `emitter` feature)
//! ```

#[cfg(feature = "bus")]
mod bus;
#[cfg(feature = "emitter")]
mod emitter;
#[cfg(feature = "bus")]
mod in_memory_queue;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::unit::VariantId;

#[cfg(feature = "bus")]
pub use bus::{BusNotifier, Event, PublishError, Publisher, STOCK_CHANGED};
#[cfg(feature = "emitter")]
pub use emitter::EmitterNotifier;
#[cfg(feature = "bus")]
pub use in_memory_queue::InMemoryQueue;

/// What kind of operation moved the available count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Created,
    Reserved,
    Released,
    Expired,
    Sold,
    Returned,
    StatusChanged,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeType::Created => "CREATED",
            ChangeType::Reserved => "RESERVED",
            ChangeType::Released => "RELEASED",
            ChangeType::Expired => "EXPIRED",
            ChangeType::Sold => "SOLD",
            ChangeType::Returned => "RETURNED",
            ChangeType::StatusChanged => "STATUS_CHANGED",
        };
        f.write_str(name)
    }
}

/// Available-count change for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub variant_id: VariantId,
    pub old_available: usize,
    pub new_available: usize,
    pub change_type: ChangeType,
    pub actor: String,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

impl StockChange {
    pub fn delta(&self) -> i64 {
        self.new_available as i64 - self.old_available as i64
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to encode stock change: {0}")]
    Encode(String),
    #[error("failed to deliver stock change: {0}")]
    Delivery(String),
}

pub trait ChangeNotifier: Send + Sync {
    fn publish(&self, change: &StockChange) -> Result<(), NotifyError>;
}

/// Writes stock changes to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl ChangeNotifier for LogNotifier {
    fn publish(&self, change: &StockChange) -> Result<(), NotifyError> {
        info!(
            target: "unit_reserve::stock",
            variant_id = change.variant_id.0,
            old_available = change.old_available,
            new_available = change.new_available,
            change_type = %change.change_type,
            actor = %change.actor,
            reason = %change.reason,
            "stock level changed"
        );
        Ok(())
    }
}
