//! Post-reservation lifecycle: sale, release, return and administrative
//! status changes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::engine::{describe, Applied, Cause, ReservationEngine};
use super::request::BatchOutcome;
use crate::audit::{AuditAction, AuditEntry, SYSTEM_ACTOR};
use crate::error::ReservationError;
use crate::lock::Locker;
use crate::notify::ChangeType;
use crate::retry::retry_on_conflict;
use crate::store::UnitStore;
use crate::unit::{InventoryUnit, UnitId, UnitStatus, VariantId};

/// How a release treats units that are not currently reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReleaseMode {
    /// Fail on the first unit that is missing or not reserved.
    Strict,
    /// Skip such units silently.
    Safe,
}

impl<S: UnitStore, L: Locker> ReservationEngine<S, L> {
    /// Mark reserved units as sold.
    ///
    /// Each id succeeds or fails on its own; a unit that is unknown, not
    /// reserved, or reserved under another order never stops the rest.
    pub fn confirm_sale(&self, unit_ids: &[UnitId], order_ref: &str, actor: &str) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let groups = self.group_by_variant(unit_ids, |id, err| outcome.failed.push((id, err)));

        for (variant_id, ids) in groups {
            let cause = Cause {
                change_type: ChangeType::Sold,
                actor,
                reason: order_ref,
            };
            let result = self.run(variant_id, cause, || {
                let now = self.clock.now();
                let old_available = self
                    .store
                    .count_by_variant_and_status(variant_id, UnitStatus::Available)?;

                let mut results = Vec::with_capacity(ids.len());
                let mut audit = Vec::new();
                for unit_id in &ids {
                    let sold = retry_on_conflict(&self.retry, || {
                        self.sell_one(*unit_id, order_ref, actor, now)
                    });
                    match sold {
                        Ok(entry) => {
                            audit.push(entry);
                            results.push((*unit_id, Ok(())));
                        }
                        Err(err) => results.push((*unit_id, Err(err))),
                    }
                }

                let levels = if audit.is_empty() {
                    None
                } else {
                    Some((old_available, old_available))
                };
                Ok(Applied {
                    value: results,
                    audit,
                    levels,
                })
            });

            match result {
                Ok(results) => {
                    for (unit_id, result) in results {
                        match result {
                            Ok(()) => outcome.succeeded.push(unit_id),
                            Err(err) => outcome.failed.push((unit_id, err)),
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        variant_id = variant_id.0,
                        order_ref,
                        error = %err,
                        "sale confirmation failed for variant"
                    );
                    outcome
                        .failed
                        .extend(ids.into_iter().map(|id| (id, err.clone())));
                }
            }
        }

        info!(
            order_ref,
            sold = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "sale confirmed"
        );
        outcome
    }

    fn sell_one(
        &self,
        unit_id: UnitId,
        order_ref: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry, ReservationError> {
        let mut unit = self
            .store
            .get(unit_id)?
            .ok_or(ReservationError::UnitNotFound(unit_id))?;
        if unit.status == UnitStatus::Reserved && !unit.is_reserved_under(order_ref) {
            return Err(ReservationError::OrderMismatch {
                unit_id,
                order_ref: order_ref.to_string(),
            });
        }

        let previous = describe(&unit);
        unit.status = unit
            .status
            .transition_to(UnitStatus::Sold)
            .map_err(|err| ReservationError::from_transition(unit_id, err))?;
        unit.updated_at = now;
        let saved = self.store.save(&unit)?;

        Ok(self.audit_entry(
            &saved,
            AuditAction::Sold,
            previous,
            saved.status.to_string(),
            actor,
            &format!("sold on {}", order_ref),
            now,
        ))
    }

    /// Release reserved units back to stock, failing fast if any unit is
    /// unknown or not reserved.
    pub fn release(
        &self,
        unit_ids: &[UnitId],
        reason: &str,
        actor: &str,
    ) -> Result<Vec<UnitId>, ReservationError> {
        for unit_id in unit_ids {
            let unit = self
                .store
                .get(*unit_id)?
                .ok_or(ReservationError::UnitNotFound(*unit_id))?;
            if unit.status != UnitStatus::Reserved {
                return Err(ReservationError::NotReserved {
                    unit_id: unit.id,
                    status: unit.status,
                });
            }
        }

        let mut first_error = None;
        let groups = self.group_by_variant(unit_ids, |_, err| {
            first_error.get_or_insert(err);
        });
        if let Some(err) = first_error {
            return Err(err);
        }

        let mut released = Vec::new();
        for (variant_id, ids) in groups {
            let cause = Cause {
                change_type: ChangeType::Released,
                actor,
                reason,
            };
            released.extend(self.release_variant(
                variant_id,
                &ids,
                ReleaseMode::Strict,
                cause,
                |_| true,
            )?);
        }
        Ok(released)
    }

    /// Release whichever of `unit_ids` are currently reserved; everything
    /// else is skipped. Safe to repeat.
    ///
    /// Every variant is attempted even if one fails; the first failure is
    /// returned after the rest have been processed.
    pub fn release_safe(
        &self,
        unit_ids: &[UnitId],
        reason: &str,
        actor: &str,
    ) -> Result<Vec<UnitId>, ReservationError> {
        let groups = self.group_by_variant(unit_ids, |_, _| {});
        self.release_groups(groups, reason, actor, ChangeType::Released, |_| true)
    }

    /// Safe-release every unit reserved under `order_ref`.
    pub fn release_order(
        &self,
        order_ref: &str,
        reason: &str,
        actor: &str,
    ) -> Result<Vec<UnitId>, ReservationError> {
        let mut groups: BTreeMap<VariantId, Vec<UnitId>> = BTreeMap::new();
        for unit in self.store.find_by_reservation_ref(order_ref)? {
            if unit.is_reserved_under(order_ref) {
                groups.entry(unit.variant_id).or_default().push(unit.id);
            }
        }
        self.release_groups(groups, reason, actor, ChangeType::Released, |unit| {
            unit.is_reserved_under(order_ref)
        })
    }

    /// Safe-release one variant's expired units as `SYSTEM`. `still_expired`
    /// is re-checked under the lock, so a unit re-stamped after the scan is
    /// left alone.
    pub(crate) fn expire<P>(
        &self,
        variant_id: VariantId,
        unit_ids: &[UnitId],
        reason: &str,
        still_expired: P,
    ) -> Result<Vec<UnitId>, ReservationError>
    where
        P: Fn(&InventoryUnit) -> bool,
    {
        let cause = Cause {
            change_type: ChangeType::Expired,
            actor: SYSTEM_ACTOR,
            reason,
        };
        self.release_variant(variant_id, unit_ids, ReleaseMode::Safe, cause, still_expired)
    }

    /// Return sold (or already returned) units to stock. A sold unit passes
    /// through `Returned` so every step is a legal transition and audited.
    pub fn return_to_stock(
        &self,
        unit_ids: &[UnitId],
        reason: &str,
        actor: &str,
    ) -> Result<Vec<UnitId>, ReservationError> {
        let mut groups: BTreeMap<VariantId, Vec<UnitId>> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for unit_id in unit_ids.iter().filter(|id| seen.insert(**id)) {
            let unit = self
                .store
                .get(*unit_id)?
                .ok_or(ReservationError::UnitNotFound(*unit_id))?;
            returnable(&unit)?;
            groups.entry(unit.variant_id).or_default().push(unit.id);
        }

        let mut returned = Vec::new();
        for (variant_id, ids) in groups {
            let cause = Cause {
                change_type: ChangeType::Returned,
                actor,
                reason,
            };
            let batch = self.run(variant_id, cause, || {
                let now = self.clock.now();
                let old_available = self
                    .store
                    .count_by_variant_and_status(variant_id, UnitStatus::Available)?;

                let mut staged = Vec::with_capacity(ids.len());
                let mut audit = Vec::with_capacity(ids.len() * 2);
                for unit_id in &ids {
                    let mut unit = self
                        .store
                        .get(*unit_id)?
                        .ok_or(ReservationError::UnitNotFound(*unit_id))?;
                    returnable(&unit)?;

                    let mut path = vec![UnitStatus::Available];
                    if unit.status == UnitStatus::Sold {
                        path.insert(0, UnitStatus::Returned);
                    }
                    for to in path {
                        self.step(
                            &mut unit,
                            to,
                            AuditAction::Returned,
                            actor,
                            reason,
                            now,
                            &mut audit,
                        )?;
                    }
                    staged.push(unit);
                }

                let saved = self.store.save_all(&staged)?;
                let new_available = self
                    .store
                    .count_by_variant_and_status(variant_id, UnitStatus::Available)?;
                Ok(Applied {
                    value: saved.iter().map(|unit| unit.id).collect::<Vec<_>>(),
                    audit,
                    levels: Some((old_available, new_available)),
                })
            })?;
            returned.extend(batch);
        }

        info!(units = returned.len(), reason, "units returned to stock");
        Ok(returned)
    }

    /// Administrative status change (damage, disposal, display, quality
    /// control, transit). Reservation and sale have their own operations.
    pub fn change_status(
        &self,
        unit_id: UnitId,
        to: UnitStatus,
        reason: &str,
        actor: &str,
    ) -> Result<InventoryUnit, ReservationError> {
        if matches!(to, UnitStatus::Reserved | UnitStatus::Sold) {
            return Err(ReservationError::InvalidRequest(format!(
                "status {} is only reachable through reservation or sale",
                to
            )));
        }
        let variant_id = self
            .store
            .get(unit_id)?
            .ok_or(ReservationError::UnitNotFound(unit_id))?
            .variant_id;

        let cause = Cause {
            change_type: ChangeType::StatusChanged,
            actor,
            reason,
        };
        self.run(variant_id, cause, || {
            let now = self.clock.now();
            let old_available = self
                .store
                .count_by_variant_and_status(variant_id, UnitStatus::Available)?;
            let mut unit = self
                .store
                .get(unit_id)?
                .ok_or(ReservationError::UnitNotFound(unit_id))?;

            let mut audit = Vec::with_capacity(1);
            self.step(
                &mut unit,
                to,
                AuditAction::StatusChanged,
                actor,
                reason,
                now,
                &mut audit,
            )?;
            let saved = self.store.save(&unit)?;
            let new_available = self
                .store
                .count_by_variant_and_status(variant_id, UnitStatus::Available)?;

            Ok(Applied {
                value: saved,
                audit,
                levels: Some((old_available, new_available)),
            })
        })
    }

    /// Apply one validated transition to `unit` and queue its audit entry.
    #[allow(clippy::too_many_arguments)]
    fn step(
        &self,
        unit: &mut InventoryUnit,
        to: UnitStatus,
        action: AuditAction,
        actor: &str,
        reason: &str,
        now: DateTime<Utc>,
        audit: &mut Vec<AuditEntry>,
    ) -> Result<(), ReservationError> {
        let previous = describe(unit);
        unit.status = unit
            .status
            .transition_to(to)
            .map_err(|err| ReservationError::from_transition(unit.id, err))?;
        unit.updated_at = now;
        audit.push(self.audit_entry(unit, action, previous, describe(unit), actor, reason, now));
        Ok(())
    }

    fn release_groups<P>(
        &self,
        groups: BTreeMap<VariantId, Vec<UnitId>>,
        reason: &str,
        actor: &str,
        change_type: ChangeType,
        keep: P,
    ) -> Result<Vec<UnitId>, ReservationError>
    where
        P: Fn(&InventoryUnit) -> bool,
    {
        let mut released = Vec::new();
        let mut first_error = None;

        for (variant_id, ids) in groups {
            let cause = Cause {
                change_type,
                actor,
                reason,
            };
            match self.release_variant(variant_id, &ids, ReleaseMode::Safe, cause, &keep) {
                Ok(ids) => released.extend(ids),
                Err(err) => {
                    warn!(variant_id = variant_id.0, error = %err, "release failed for variant");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(released),
        }
    }

    fn release_variant<P>(
        &self,
        variant_id: VariantId,
        unit_ids: &[UnitId],
        mode: ReleaseMode,
        cause: Cause<'_>,
        keep: P,
    ) -> Result<Vec<UnitId>, ReservationError>
    where
        P: Fn(&InventoryUnit) -> bool,
    {
        let actor = cause.actor;
        let reason = cause.reason;
        let action = AuditAction::Released;

        self.run(variant_id, cause, || {
            let now = self.clock.now();
            let old_available = self
                .store
                .count_by_variant_and_status(variant_id, UnitStatus::Available)?;

            let mut staged = Vec::with_capacity(unit_ids.len());
            let mut audit = Vec::with_capacity(unit_ids.len());
            for unit_id in unit_ids {
                let unit = match self.store.get(*unit_id)? {
                    Some(unit) if unit.status == UnitStatus::Reserved && keep(&unit) => unit,
                    Some(unit) if mode == ReleaseMode::Strict => {
                        return Err(ReservationError::NotReserved {
                            unit_id: unit.id,
                            status: unit.status,
                        })
                    }
                    None if mode == ReleaseMode::Strict => {
                        return Err(ReservationError::UnitNotFound(*unit_id))
                    }
                    _ => continue,
                };

                let mut unit = unit;
                self.step(
                    &mut unit,
                    UnitStatus::Available,
                    action,
                    actor,
                    reason,
                    now,
                    &mut audit,
                )?;
                staged.push(unit);
            }

            if staged.is_empty() {
                return Ok(Applied::unchanged(Vec::new()));
            }

            let saved = self.store.save_all(&staged)?;
            let new_available = self
                .store
                .count_by_variant_and_status(variant_id, UnitStatus::Available)?;
            info!(
                variant_id = variant_id.0,
                units = saved.len(),
                actor,
                reason,
                "units released"
            );
            Ok(Applied {
                value: saved.iter().map(|unit| unit.id).collect(),
                audit,
                levels: Some((old_available, new_available)),
            })
        })
    }

    /// Look each id up without locking and bucket it under its variant.
    /// Repeated ids are kept once. Ids that cannot be resolved are handed
    /// to `on_missing`.
    fn group_by_variant<F>(
        &self,
        unit_ids: &[UnitId],
        mut on_missing: F,
    ) -> BTreeMap<VariantId, Vec<UnitId>>
    where
        F: FnMut(UnitId, ReservationError),
    {
        let mut groups: BTreeMap<VariantId, Vec<UnitId>> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for unit_id in unit_ids.iter().filter(|id| seen.insert(**id)) {
            match self.store.get(*unit_id) {
                Ok(Some(unit)) => groups.entry(unit.variant_id).or_default().push(unit.id),
                Ok(None) => on_missing(*unit_id, ReservationError::UnitNotFound(*unit_id)),
                Err(err) => on_missing(*unit_id, err.into()),
            }
        }
        groups
    }
}

fn returnable(unit: &InventoryUnit) -> Result<(), ReservationError> {
    match unit.status {
        UnitStatus::Sold | UnitStatus::Returned => Ok(()),
        from => Err(ReservationError::InvalidTransition {
            unit_id: unit.id,
            from,
            to: UnitStatus::Returned,
        }),
    }
}
