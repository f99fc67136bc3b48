//! Stock-change publication onto a message bus.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use super::{ChangeNotifier, NotifyError, StockChange};

/// Event type used for every stock-change message.
pub const STOCK_CHANGED: &str = "stock.changed";

/// A message to be published to the bus.
#[derive(Clone, Debug)]
pub struct Event {
    /// Unique identifier for this event
    pub id: String,
    /// Event type (e.g. "stock.changed")
    pub event_type: String,
    /// Serialized payload
    pub payload: Vec<u8>,
    /// Optional metadata (headers, correlation IDs, etc.)
    pub metadata: Option<Vec<(String, String)>>,
}

impl Event {
    pub fn new(id: impl Into<String>, event_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            payload,
            metadata: None,
        }
    }

    /// Create an event with bitcode-serialized payload.
    pub fn encode<T: serde::Serialize>(
        id: impl Into<String>,
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, bitcode::Error> {
        let bytes = bitcode::serialize(payload)?;
        Ok(Self::new(id, event_type, bytes))
    }

    /// Decode the payload from bitcode binary format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.payload)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Error type for publish operations.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Event rejected: {0}")]
    Rejected(String),
    #[error("Publish timeout")]
    Timeout,
}

/// Trait for publishing events to a message bus (Kafka, NATS, an in-memory
/// queue, ...).
pub trait Publisher: Send + Sync {
    fn publish(&self, event: Event) -> Result<(), PublishError>;
}

/// Publishes each [`StockChange`] as a bitcode-encoded [`STOCK_CHANGED`]
/// event, tagged with the variant id so consumers can partition on it.
pub struct BusNotifier<P> {
    publisher: P,
    seq: AtomicU64,
}

impl<P: Publisher> BusNotifier<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            seq: AtomicU64::new(1),
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

impl<P: Publisher> ChangeNotifier for BusNotifier<P> {
    fn publish(&self, change: &StockChange) -> Result<(), NotifyError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = format!("stock-{}-{}", change.variant_id, seq);
        let event = Event::encode(id, STOCK_CHANGED, change)
            .map_err(|e| NotifyError::Encode(e.to_string()))?
            .with_metadata("variant_id", change.variant_id.to_string())
            .with_metadata("change_type", change.change_type.to_string());

        self.publisher
            .publish(event)
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}
