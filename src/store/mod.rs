//! UnitStore - persistence of inventory units.
//!
//! Writes are conditional: a unit is saved only if its `version` still matches
//! the stored one, otherwise the write fails with
//! [`StoreError::VersionConflict`]. Any backend with row versions, ETags or
//! compare-and-swap can implement the trait.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use unit_reserve::store::{InMemoryUnitStore, UnitStore};
//! use unit_reserve::{NewUnit, UnitStatus, VariantId};
//!
//! let store = InMemoryUnitStore::new();
//! let unit = store.insert(NewUnit::new(VariantId(1), "SN-0001"), Utc::now()).unwrap();
//! assert_eq!(unit.status, UnitStatus::Available);
//!
//! let mut stale = unit.clone();
//! let mut fresh = unit;
//! fresh.status = UnitStatus::Reserved;
//! store.save(&fresh).unwrap();
//!
//! stale.status = UnitStatus::Damaged;
//! assert!(store.save(&stale).is_err());
//! ```

mod in_memory;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::unit::{InventoryUnit, NewUnit, UnitId, UnitStatus, VariantId};

pub use in_memory::InMemoryUnitStore;

/// Error type for unit store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The stored record changed since it was read.
    #[error("version conflict on unit {unit_id} (expected version {expected}, actual {actual})")]
    VersionConflict {
        unit_id: UnitId,
        expected: u64,
        actual: u64,
    },
    #[error("unit not found: {0}")]
    NotFound(UnitId),
    #[error("serial already assigned: {0}")]
    DuplicateSerial(String),
    /// Storage-level error.
    #[error("unit storage error: {0}")]
    Storage(String),
}

/// Abstract storage for inventory units.
///
/// Listing methods return units in ascending id order.
pub trait UnitStore: Send + Sync {
    fn get(&self, id: UnitId) -> Result<Option<InventoryUnit>, StoreError>;

    fn find_by_variant(&self, variant_id: VariantId) -> Result<Vec<InventoryUnit>, StoreError>;

    fn find_by_variant_and_status(
        &self,
        variant_id: VariantId,
        status: UnitStatus,
    ) -> Result<Vec<InventoryUnit>, StoreError>;

    fn count_by_variant_and_status(
        &self,
        variant_id: VariantId,
        status: UnitStatus,
    ) -> Result<usize, StoreError>;

    fn find_by_status(&self, status: UnitStatus) -> Result<Vec<InventoryUnit>, StoreError>;

    /// Units currently reserved under an order reference starting with `prefix`.
    fn find_by_reservation_ref_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<InventoryUnit>, StoreError>;

    /// Units currently reserved under exactly `order_ref`.
    fn find_by_reservation_ref(&self, order_ref: &str) -> Result<Vec<InventoryUnit>, StoreError>;

    /// Store a new unit as `Available` with version 1, created at `at`. Fails
    /// on a serial that was ever assigned before.
    fn insert(&self, unit: NewUnit, at: DateTime<Utc>) -> Result<InventoryUnit, StoreError>;

    /// Version-checked write. Returns the unit as stored (version bumped).
    fn save(&self, unit: &InventoryUnit) -> Result<InventoryUnit, StoreError>;

    /// Version-checked write of several units; either all are written or none.
    fn save_all(&self, units: &[InventoryUnit]) -> Result<Vec<InventoryUnit>, StoreError>;
}
