use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::request::{plan_by_variant, ReservationContext, ReservationRequest, VariantPlan};
use crate::audit::{AuditAction, AuditEntry, AuditRecorder, LogAuditRecorder};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::ReservationError;
use crate::lock::{InMemoryLocker, Locker};
use crate::notify::{ChangeNotifier, ChangeType, LogNotifier, StockChange};
use crate::retry::{retry_on_conflict, RetryPolicy};
use crate::store::UnitStore;
use crate::unit::{InventoryUnit, RefKind, ReservationStamp, UnitId, UnitStatus, VariantId};

/// Lock key guarding every mutation of one variant's units.
pub fn variant_lock_key(variant_id: VariantId) -> String {
    format!("inventory:variant:{}", variant_id)
}

/// The result of one locked body: its value plus the side effects to emit
/// once it has committed.
pub(crate) struct Applied<T> {
    pub value: T,
    pub audit: Vec<AuditEntry>,
    /// Available count before and after, when anything was written.
    pub levels: Option<(usize, usize)>,
}

impl<T> Applied<T> {
    pub fn unchanged(value: T) -> Self {
        Self {
            value,
            audit: Vec::new(),
            levels: None,
        }
    }
}

/// What a change notification says about the operation that caused it.
pub(crate) struct Cause<'a> {
    pub change_type: ChangeType,
    pub actor: &'a str,
    pub reason: &'a str,
}

/// Reserves, sells, releases and returns serialized units.
///
/// Every mutation of a variant's units runs inside that variant's lock,
/// with the body retried on optimistic version conflicts. Audit entries are
/// appended before the lock is released; the stock-change notification is
/// published after. Neither can fail an operation.
pub struct ReservationEngine<S, L = InMemoryLocker> {
    pub(crate) store: S,
    pub(crate) locker: L,
    pub(crate) audit: Arc<dyn AuditRecorder>,
    pub(crate) notifier: Arc<dyn ChangeNotifier>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: EngineConfig,
    pub(crate) retry: RetryPolicy,
}

impl<S: UnitStore> ReservationEngine<S, InMemoryLocker> {
    /// Engine with an in-process lock manager.
    pub fn in_memory(store: S) -> Self {
        Self::new(store, InMemoryLocker::in_memory())
    }
}

impl<S: UnitStore, L: Locker> ReservationEngine<S, L> {
    pub fn new(store: S, locker: L) -> Self {
        let config = EngineConfig::default();
        Self {
            store,
            locker,
            audit: Arc::new(LogAuditRecorder),
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            retry: config.retry_policy(),
            config,
        }
    }

    #[must_use]
    pub fn with_audit<A: AuditRecorder + 'static>(mut self, audit: A) -> Self {
        self.audit = Arc::new(audit);
        self
    }

    #[must_use]
    pub fn with_notifier<N: ChangeNotifier + 'static>(mut self, notifier: N) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    #[must_use]
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.retry = config.retry_policy();
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locker(&self) -> &L {
        &self.locker
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Reserve any `quantity` available units of a variant, lowest ids
    /// first. All or nothing.
    pub fn reserve_bulk(
        &self,
        variant_id: VariantId,
        quantity: usize,
        ctx: &ReservationContext,
    ) -> Result<Vec<UnitId>, ReservationError> {
        if quantity == 0 {
            return Err(ReservationError::InvalidRequest(
                "quantity must be positive".into(),
            ));
        }
        let plan = VariantPlan {
            specific: Vec::new(),
            quantity,
        };
        self.reserve_variant(variant_id, &plan, ctx)
    }

    /// Reserve one particular unit.
    ///
    /// An available unit becomes reserved. A unit already reserved under a
    /// cart session or a temporary pre-order reference is re-stamped onto
    /// `ctx` without leaving `Reserved`.
    pub fn reserve_specific(
        &self,
        unit_id: UnitId,
        variant_id: VariantId,
        ctx: &ReservationContext,
    ) -> Result<UnitId, ReservationError> {
        let plan = VariantPlan {
            specific: vec![unit_id],
            quantity: 0,
        };
        self.reserve_variant(variant_id, &plan, ctx)?;
        Ok(unit_id)
    }

    /// Reserve every line of a multi-line request.
    ///
    /// Lines are grouped per variant and each variant is reserved under one
    /// lock acquisition, specific units first, then the summed "any"
    /// quantity. Variants are processed in ascending id order; if one fails,
    /// everything reserved earlier in this call is safe-released before the
    /// error is returned.
    pub fn reserve(
        &self,
        requests: &[ReservationRequest],
        ctx: &ReservationContext,
    ) -> Result<Vec<UnitId>, ReservationError> {
        let plans = plan_by_variant(requests)?;
        let mut reserved = Vec::new();

        for (variant_id, plan) in &plans {
            match self.reserve_variant(*variant_id, plan, ctx) {
                Ok(ids) => reserved.extend(ids),
                Err(err) => {
                    self.compensate(&reserved, ctx, &err);
                    return Err(err);
                }
            }
        }

        info!(
            order_ref = %ctx.order_ref,
            channel = %ctx.channel,
            variants = plans.len(),
            units = reserved.len(),
            "reservation committed"
        );
        Ok(reserved)
    }

    /// Read-only check that every line could be reserved right now.
    pub fn check_availability(
        &self,
        requests: &[ReservationRequest],
    ) -> Result<bool, ReservationError> {
        let plans = plan_by_variant(requests)?;

        for (variant_id, plan) in &plans {
            let mut taken_from_pool = 0;
            for unit_id in &plan.specific {
                let Some(unit) = self.store.get(*unit_id)? else {
                    return Ok(false);
                };
                if unit.variant_id != *variant_id {
                    return Ok(false);
                }
                match unit.status {
                    UnitStatus::Available => taken_from_pool += 1,
                    UnitStatus::Reserved if is_restampable(&unit) => {}
                    _ => return Ok(false),
                }
            }

            let available = self
                .store
                .count_by_variant_and_status(*variant_id, UnitStatus::Available)?;
            if available.saturating_sub(taken_from_pool) < plan.quantity {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn compensate(&self, reserved: &[UnitId], ctx: &ReservationContext, cause: &ReservationError) {
        if reserved.is_empty() {
            return;
        }
        warn!(
            order_ref = %ctx.order_ref,
            units = reserved.len(),
            error = %cause,
            "reservation failed, releasing units reserved earlier in this request"
        );
        let reason = format!("compensation for failed reservation {}", ctx.order_ref);
        if let Err(err) = self.release_safe(reserved, &reason, &ctx.actor) {
            error!(
                order_ref = %ctx.order_ref,
                error = %err,
                "compensating release failed, units may remain reserved until swept"
            );
        }
    }

    /// Reserve one variant's share of a request under its lock.
    fn reserve_variant(
        &self,
        variant_id: VariantId,
        plan: &VariantPlan,
        ctx: &ReservationContext,
    ) -> Result<Vec<UnitId>, ReservationError> {
        let cause = Cause {
            change_type: ChangeType::Reserved,
            actor: &ctx.actor,
            reason: &ctx.order_ref,
        };

        self.run(variant_id, cause, || {
            let now = self.clock.now();
            let old_available = self
                .store
                .count_by_variant_and_status(variant_id, UnitStatus::Available)?;

            let mut staged = Vec::with_capacity(plan.specific.len() + plan.quantity);
            let mut audit = Vec::with_capacity(staged.capacity());
            let mut claimed = HashSet::new();

            for unit_id in &plan.specific {
                let unit = self
                    .store
                    .get(*unit_id)?
                    .ok_or(ReservationError::UnitNotFound(*unit_id))?;
                if unit.variant_id != variant_id {
                    return Err(ReservationError::VariantMismatch {
                        unit_id: unit.id,
                        expected: variant_id,
                        actual: unit.variant_id,
                    });
                }

                let (next, entry) = match unit.status {
                    UnitStatus::Available => self.stage_reservation(unit, ctx, now)?,
                    UnitStatus::Reserved if can_restamp(&unit, ctx) => {
                        self.stage_restamp(unit, ctx, now)
                    }
                    status => {
                        return Err(ReservationError::UnitNotReservable {
                            unit_id: unit.id,
                            status,
                        })
                    }
                };
                claimed.insert(next.id);
                staged.push(next);
                audit.push(entry);
            }

            if plan.quantity > 0 {
                let pool: Vec<InventoryUnit> = self
                    .store
                    .find_by_variant_and_status(variant_id, UnitStatus::Available)?
                    .into_iter()
                    .filter(|unit| !claimed.contains(&unit.id))
                    .collect();
                if pool.len() < plan.quantity {
                    return Err(ReservationError::InsufficientInventory {
                        variant_id,
                        requested: plan.quantity,
                        available: pool.len(),
                    });
                }
                for unit in pool.into_iter().take(plan.quantity) {
                    let (next, entry) = self.stage_reservation(unit, ctx, now)?;
                    staged.push(next);
                    audit.push(entry);
                }
            }

            let saved = self.store.save_all(&staged)?;
            let new_available = self
                .store
                .count_by_variant_and_status(variant_id, UnitStatus::Available)?;
            debug!(
                variant_id = variant_id.0,
                order_ref = %ctx.order_ref,
                units = saved.len(),
                "units reserved"
            );

            Ok(Applied {
                value: saved.iter().map(|unit| unit.id).collect(),
                audit,
                levels: Some((old_available, new_available)),
            })
        })
    }

    fn stage_reservation(
        &self,
        mut unit: InventoryUnit,
        ctx: &ReservationContext,
        now: DateTime<Utc>,
    ) -> Result<(InventoryUnit, AuditEntry), ReservationError> {
        let from = unit.status;
        unit.status = from
            .transition_to(UnitStatus::Reserved)
            .map_err(|err| ReservationError::from_transition(unit.id, err))?;
        unit.reservation = Some(stamp_for(ctx, now));
        unit.updated_at = now;

        let entry = self.audit_entry(
            &unit,
            AuditAction::Reserved,
            from.to_string(),
            describe(&unit),
            &ctx.actor,
            &format!("reserved for {}", ctx.order_ref),
            now,
        );
        Ok((unit, entry))
    }

    fn stage_restamp(
        &self,
        mut unit: InventoryUnit,
        ctx: &ReservationContext,
        now: DateTime<Utc>,
    ) -> (InventoryUnit, AuditEntry) {
        let previous = describe(&unit);
        unit.reservation = Some(stamp_for(ctx, now));
        unit.updated_at = now;

        let entry = self.audit_entry(
            &unit,
            AuditAction::Restamped,
            previous,
            describe(&unit),
            &ctx.actor,
            &format!("converted to {}", ctx.order_ref),
            now,
        );
        (unit, entry)
    }

    /// Run `body` under the variant lock with optimistic retry, record its
    /// audit entries, then announce the stock change.
    pub(crate) fn run<T, F>(
        &self,
        variant_id: VariantId,
        cause: Cause<'_>,
        body: F,
    ) -> Result<T, ReservationError>
    where
        F: FnMut() -> Result<Applied<T>, ReservationError>,
    {
        let key = variant_lock_key(variant_id);
        let applied = self.locker.with_lock(
            &key,
            self.config.lock_wait(),
            self.config.lock_lease(),
            || {
                let applied = retry_on_conflict(&self.retry, body)?;
                self.record(&applied.audit);
                Ok::<_, ReservationError>(applied)
            },
        )?;

        if let Some((old_available, new_available)) = applied.levels {
            self.announce(StockChange {
                variant_id,
                old_available,
                new_available,
                change_type: cause.change_type,
                actor: cause.actor.to_string(),
                reason: cause.reason.to_string(),
                occurred_at: self.clock.now(),
            });
        }
        Ok(applied.value)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn audit_entry(
        &self,
        unit: &InventoryUnit,
        action: AuditAction,
        old_value: String,
        new_value: String,
        actor: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AuditEntry {
        AuditEntry {
            unit_id: unit.id,
            action,
            old_value,
            new_value,
            actor: actor.to_string(),
            reason: reason.to_string(),
            recorded_at: at,
        }
    }

    pub(crate) fn record(&self, entries: &[AuditEntry]) {
        for entry in entries {
            if let Err(err) = self.audit.append(entry.clone()) {
                warn!(
                    unit_id = entry.unit_id.0,
                    action = %entry.action,
                    error = %err,
                    "failed to append audit entry"
                );
            }
        }
    }

    fn announce(&self, change: StockChange) {
        if let Err(err) = self.notifier.publish(&change) {
            warn!(
                variant_id = change.variant_id.0,
                change_type = %change.change_type,
                error = %err,
                "failed to publish stock change"
            );
        }
    }
}

/// A reserved unit whose reference is provisional and may be taken over by
/// a final order.
fn is_restampable(unit: &InventoryUnit) -> bool {
    unit.active_reservation()
        .map(|stamp| stamp.is_cart_session() || stamp.is_temp_order())
        .unwrap_or(false)
}

/// A provisional reservation converts only into an order or temporary
/// reference, never into another cart session.
fn can_restamp(unit: &InventoryUnit, ctx: &ReservationContext) -> bool {
    is_restampable(unit) && RefKind::of(&ctx.order_ref) != RefKind::CartSession
}

fn stamp_for(ctx: &ReservationContext, now: DateTime<Utc>) -> ReservationStamp {
    ReservationStamp {
        channel: ctx.channel.clone(),
        order_ref: ctx.order_ref.clone(),
        reserved_at: now,
    }
}

/// Audit rendering of a unit's state: the status, plus channel and order
/// while reserved.
pub(crate) fn describe(unit: &InventoryUnit) -> String {
    match unit.active_reservation() {
        Some(stamp) => format!("{} {} {}", unit.status, stamp.channel, stamp.order_ref),
        None => unit.status.to_string(),
    }
}
