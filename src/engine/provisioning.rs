//! Creating units: single registration and bulk serial generation.

use tracing::{debug, info, warn};

use super::engine::{Applied, Cause, ReservationEngine};
use crate::audit::AuditAction;
use crate::error::ReservationError;
use crate::lock::Locker;
use crate::notify::ChangeType;
use crate::store::{StoreError, UnitStore};
use crate::unit::{InventoryUnit, NewUnit, Provenance, UnitStatus, VariantId};

/// Minimum number of digits in a generated serial.
const SERIAL_DIGITS: usize = 6;

impl<S: UnitStore, L: Locker> ReservationEngine<S, L> {
    /// Store one new unit as available.
    pub fn register_unit(
        &self,
        unit: NewUnit,
        actor: &str,
    ) -> Result<InventoryUnit, ReservationError> {
        if unit.serial.trim().is_empty() {
            return Err(ReservationError::InvalidRequest(
                "serial must not be empty".into(),
            ));
        }
        let variant_id = unit.variant_id;
        let reason = format!("registered serial {}", unit.serial);
        let cause = Cause {
            change_type: ChangeType::Created,
            actor,
            reason: &reason,
        };

        self.run(variant_id, cause, || {
            let now = self.clock.now();
            let old_available = self
                .store
                .count_by_variant_and_status(variant_id, UnitStatus::Available)?;
            let created = self.store.insert(unit.clone(), now)?;
            let entry = self.audit_entry(
                &created,
                AuditAction::Created,
                String::new(),
                created.status.to_string(),
                actor,
                &reason,
                now,
            );
            Ok(Applied {
                value: created,
                audit: vec![entry],
                levels: Some((old_available, old_available + 1)),
            })
        })
    }

    /// Create `count` available units with serials `{prefix}{n}`, `n`
    /// zero-padded and counting from 1. Serials already taken are skipped,
    /// so the numbering may have gaps.
    ///
    /// Units are inserted one at a time. If the store fails partway, the
    /// units already inserted stay and are audited, but no stock-change
    /// notification is published for them.
    pub fn generate_units(
        &self,
        variant_id: VariantId,
        count: usize,
        serial_prefix: &str,
        provenance: Provenance,
        actor: &str,
    ) -> Result<Vec<InventoryUnit>, ReservationError> {
        if count == 0 {
            return Err(ReservationError::InvalidRequest(
                "count must be positive".into(),
            ));
        }
        let width = SERIAL_DIGITS.max(count.to_string().len());
        let reason = format!("generated {} units with prefix {}", count, serial_prefix);
        let cause = Cause {
            change_type: ChangeType::Created,
            actor,
            reason: &reason,
        };

        let created = self.run(variant_id, cause, || {
            let now = self.clock.now();
            let old_available = self
                .store
                .count_by_variant_and_status(variant_id, UnitStatus::Available)?;

            let mut created = Vec::with_capacity(count);
            let mut audit = Vec::with_capacity(count);
            let mut n: u64 = 0;
            while created.len() < count {
                n += 1;
                let serial = format!("{}{:0width$}", serial_prefix, n, width = width);
                let new_unit = NewUnit::new(variant_id, serial).with_provenance(provenance.clone());
                match self.store.insert(new_unit, now) {
                    Ok(unit) => {
                        audit.push(self.audit_entry(
                            &unit,
                            AuditAction::Created,
                            String::new(),
                            unit.status.to_string(),
                            actor,
                            &reason,
                            now,
                        ));
                        created.push(unit);
                    }
                    Err(StoreError::DuplicateSerial(serial)) => {
                        debug!(serial = %serial, "serial already taken, skipping");
                    }
                    Err(err) => {
                        if !created.is_empty() {
                            warn!(
                                variant_id = variant_id.0,
                                inserted = created.len(),
                                error = %err,
                                "unit generation stopped partway"
                            );
                            self.record(&audit);
                        }
                        return Err(err.into());
                    }
                }
            }

            Ok(Applied {
                levels: Some((old_available, old_available + created.len())),
                value: created,
                audit,
            })
        })?;

        info!(
            variant_id = variant_id.0,
            count = created.len(),
            prefix = serial_prefix,
            "units generated"
        );
        Ok(created)
    }
}
