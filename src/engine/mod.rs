//! ReservationEngine - the only writer of unit state besides the sweeper.
//!
//! ```text
//! caller ──reserve / confirm / release / return──▶ ReservationEngine
//!                                                      │
//!                         Locker::with_lock("inventory:variant:{id}")
//!                                                      │
//!                               retry_on_conflict(body) ──▶ UnitStore
//!                                                      │
//!                        AuditRecorder (inside lock) · ChangeNotifier (after)
//! ```
//!
//! ## Example
//!
//! ```
//! use unit_reserve::engine::{ReservationContext, ReservationEngine};
//! use unit_reserve::store::InMemoryUnitStore;
//! use unit_reserve::{Channel, Provenance, UnitStatus, VariantId};
//!
//! let engine = ReservationEngine::in_memory(InMemoryUnitStore::new());
//! let variant = VariantId(1);
//! engine
//!     .generate_units(variant, 5, "SN-", Provenance::default(), "import")
//!     .unwrap();
//!
//! let ctx = ReservationContext::new(Channel::Online, "O1", "checkout");
//! let reserved = engine.reserve_bulk(variant, 3, &ctx).unwrap();
//!
//! assert_eq!(reserved.len(), 3);
//! assert_eq!(engine.available_count(variant).unwrap(), 2);
//! assert_eq!(engine.unit(reserved[0]).unwrap().status, UnitStatus::Reserved);
//! ```

#[allow(clippy::module_inception)]
mod engine;
mod lifecycle;
mod provisioning;
mod queries;
mod request;

pub use engine::{variant_lock_key, ReservationEngine};
pub use request::{
    BatchOutcome, RequestKind, ReservationContext, ReservationRequest, StockSummary,
};
