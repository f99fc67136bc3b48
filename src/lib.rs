//! Reservation engine for individually serialized stock units.
//!
//! Every mutation of a variant's units runs under that variant's lock
//! ([`lock`]), with optimistic version checks retried on conflict
//! ([`retry`]) and status changes validated against one transition table
//! ([`UnitStatus`]). Abandoned reservations are reclaimed by the
//! [`sweeper`].

pub mod audit;
pub mod clock;
pub mod config;
pub mod engine;
mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod lock;
pub mod notify;
pub mod retry;
pub mod store;
pub mod sweeper;
mod unit;

pub use audit::{AuditAction, AuditEntry, AuditRecorder, InMemoryAuditLog, SYSTEM_ACTOR};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use engine::{
    BatchOutcome, ReservationContext, ReservationEngine, ReservationRequest, StockSummary,
};
pub use error::{ErrorKind, ReservationError};
pub use retry::RetryPolicy;
pub use sweeper::{ExpirationSweeper, SweepReport, SweeperThread};
pub use unit::{
    cart_session_ref, temp_order_ref, Channel, InventoryUnit, NewUnit, ParseStatusError,
    Provenance, RefKind, ReservationStamp, TransitionError, UnitId, UnitStatus, VariantId,
    CART_SESSION_PREFIX, TEMP_ORDER_PREFIX,
};
