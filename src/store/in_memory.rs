//! InMemoryUnitStore - BTreeMap-backed unit store for tests and single-process use.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::{StoreError, UnitStore};
use crate::unit::{InventoryUnit, NewUnit, UnitId, UnitStatus, VariantId};

#[derive(Default)]
struct StoreState {
    units: BTreeMap<UnitId, InventoryUnit>,
    /// Every serial ever assigned. Never shrinks.
    serials: HashSet<String>,
    next_id: u64,
}

impl StoreState {
    fn check_version(&self, unit: &InventoryUnit) -> Result<(), StoreError> {
        let stored = self
            .units
            .get(&unit.id)
            .ok_or(StoreError::NotFound(unit.id))?;

        if stored.version != unit.version {
            return Err(StoreError::VersionConflict {
                unit_id: unit.id,
                expected: unit.version,
                actual: stored.version,
            });
        }
        if stored.serial != unit.serial {
            return Err(StoreError::Storage(format!(
                "serial of unit {} is immutable",
                unit.id
            )));
        }
        Ok(())
    }

    fn write(&mut self, unit: &InventoryUnit) -> InventoryUnit {
        let mut stored = unit.clone();
        stored.version = unit.version + 1;
        self.units.insert(stored.id, stored.clone());
        stored
    }
}

/// In-memory unit store.
///
/// Clone-friendly via `Arc`; clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryUnitStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryUnitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored units.
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.units.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filtered<F>(&self, predicate: F) -> Result<Vec<InventoryUnit>, StoreError>
    where
        F: Fn(&InventoryUnit) -> bool,
    {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;
        Ok(state
            .units
            .values()
            .filter(|unit| predicate(unit))
            .cloned()
            .collect())
    }
}

impl UnitStore for InMemoryUnitStore {
    fn get(&self, id: UnitId) -> Result<Option<InventoryUnit>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;
        Ok(state.units.get(&id).cloned())
    }

    fn find_by_variant(&self, variant_id: VariantId) -> Result<Vec<InventoryUnit>, StoreError> {
        self.filtered(|unit| unit.variant_id == variant_id)
    }

    fn find_by_variant_and_status(
        &self,
        variant_id: VariantId,
        status: UnitStatus,
    ) -> Result<Vec<InventoryUnit>, StoreError> {
        self.filtered(|unit| unit.variant_id == variant_id && unit.status == status)
    }

    fn count_by_variant_and_status(
        &self,
        variant_id: VariantId,
        status: UnitStatus,
    ) -> Result<usize, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;
        Ok(state
            .units
            .values()
            .filter(|unit| unit.variant_id == variant_id && unit.status == status)
            .count())
    }

    fn find_by_status(&self, status: UnitStatus) -> Result<Vec<InventoryUnit>, StoreError> {
        self.filtered(|unit| unit.status == status)
    }

    fn find_by_reservation_ref_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<InventoryUnit>, StoreError> {
        self.filtered(|unit| {
            unit.active_reservation()
                .map(|stamp| stamp.order_ref.starts_with(prefix))
                .unwrap_or(false)
        })
    }

    fn find_by_reservation_ref(&self, order_ref: &str) -> Result<Vec<InventoryUnit>, StoreError> {
        self.filtered(|unit| unit.is_reserved_under(order_ref))
    }

    fn insert(&self, unit: NewUnit, at: DateTime<Utc>) -> Result<InventoryUnit, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;

        if unit.serial.trim().is_empty() {
            return Err(StoreError::Storage("serial must not be empty".into()));
        }
        if state.serials.contains(&unit.serial) {
            return Err(StoreError::DuplicateSerial(unit.serial));
        }

        state.next_id += 1;
        let stored = InventoryUnit {
            id: UnitId(state.next_id),
            serial: unit.serial,
            variant_id: unit.variant_id,
            status: UnitStatus::Available,
            reservation: None,
            provenance: unit.provenance,
            created_at: at,
            updated_at: at,
            version: 1,
        };
        state.serials.insert(stored.serial.clone());
        state.units.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn save(&self, unit: &InventoryUnit) -> Result<InventoryUnit, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;
        state.check_version(unit)?;
        Ok(state.write(unit))
    }

    fn save_all(&self, units: &[InventoryUnit]) -> Result<Vec<InventoryUnit>, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;

        let mut seen = HashSet::with_capacity(units.len());
        for unit in units {
            if !seen.insert(unit.id) {
                return Err(StoreError::Storage(format!(
                    "unit {} appears twice in one write",
                    unit.id
                )));
            }
            state.check_version(unit)?;
        }

        Ok(units.iter().map(|unit| state.write(unit)).collect())
    }
}
