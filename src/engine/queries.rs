//! Lock-free reads. Results may trail an in-flight mutation.

use std::collections::BTreeMap;

use super::engine::ReservationEngine;
use super::request::StockSummary;
use crate::error::ReservationError;
use crate::lock::Locker;
use crate::store::UnitStore;
use crate::unit::{InventoryUnit, UnitId, UnitStatus, VariantId};

impl<S: UnitStore, L: Locker> ReservationEngine<S, L> {
    /// Number of available units, always counted from the units themselves.
    pub fn available_count(&self, variant_id: VariantId) -> Result<usize, ReservationError> {
        Ok(self
            .store
            .count_by_variant_and_status(variant_id, UnitStatus::Available)?)
    }

    pub fn unit(&self, unit_id: UnitId) -> Result<InventoryUnit, ReservationError> {
        self.store
            .get(unit_id)?
            .ok_or(ReservationError::UnitNotFound(unit_id))
    }

    pub fn units_for_variant(
        &self,
        variant_id: VariantId,
    ) -> Result<Vec<InventoryUnit>, ReservationError> {
        Ok(self.store.find_by_variant(variant_id)?)
    }

    /// Units currently reserved under `order_ref`.
    pub fn units_for_order(&self, order_ref: &str) -> Result<Vec<InventoryUnit>, ReservationError> {
        Ok(self
            .store
            .find_by_reservation_ref(order_ref)?
            .into_iter()
            .filter(|unit| unit.is_reserved_under(order_ref))
            .collect())
    }

    pub fn stock_summary(&self, variant_id: VariantId) -> Result<StockSummary, ReservationError> {
        let units = self.store.find_by_variant(variant_id)?;
        let mut by_status = BTreeMap::new();
        for unit in &units {
            *by_status.entry(unit.status).or_insert(0) += 1;
        }
        Ok(StockSummary {
            variant_id,
            total: units.len(),
            by_status,
        })
    }
}
