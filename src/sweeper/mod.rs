//! ExpirationSweeper - releases reservations nobody came back for.
//!
//! Three independent passes, each a safe release attributed to `SYSTEM`:
//!
//! 1. any reservation older than `reservation_timeout`
//! 2. temporary pre-order references older than `temp_order_timeout`
//! 3. cart-session references older than `cart_session_timeout`
//!
//! Expiry is re-checked under the variant lock, so a unit re-stamped onto an
//! order between the scan and the release is left alone. Running a sweep
//! twice is harmless.

mod thread;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::engine::ReservationEngine;
use crate::error::ReservationError;
use crate::lock::Locker;
use crate::store::UnitStore;
use crate::unit::{
    InventoryUnit, RefKind, UnitId, UnitStatus, VariantId, CART_SESSION_PREFIX,
    TEMP_ORDER_PREFIX,
};

pub use thread::{SweepStats, SweeperThread};

/// Units released by one sweep, per pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_reservations: Vec<UnitId>,
    pub expired_temp_orders: Vec<UnitId>,
    pub expired_cart_sessions: Vec<UnitId>,
    /// Units that were due but could not be released this time.
    pub failed: Vec<UnitId>,
}

impl SweepReport {
    pub fn released(&self) -> usize {
        self.expired_reservations.len()
            + self.expired_temp_orders.len()
            + self.expired_cart_sessions.len()
    }
}

/// Which reservations a pass looks at.
#[derive(Debug, Clone, Copy)]
struct Pass {
    name: &'static str,
    kind: Option<RefKind>,
    timeout: Duration,
}

impl Pass {
    fn is_due(&self, unit: &InventoryUnit, now: DateTime<Utc>) -> bool {
        let Some(stamp) = unit.active_reservation() else {
            return false;
        };
        let kind_matches = self.kind.map_or(true, |kind| stamp.ref_kind() == kind);
        kind_matches && now.signed_duration_since(stamp.reserved_at) > self.timeout
    }
}

pub struct ExpirationSweeper<S, L> {
    engine: Arc<ReservationEngine<S, L>>,
}

impl<S, L> Clone for ExpirationSweeper<S, L> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S: UnitStore, L: Locker> ExpirationSweeper<S, L> {
    pub fn new(engine: Arc<ReservationEngine<S, L>>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ReservationEngine<S, L> {
        &self.engine
    }

    /// Sweep as of the engine clock.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_once(self.engine.now())
    }

    /// Run all three passes as of `now`.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        let config = self.engine.config();
        let mut report = SweepReport::default();

        let general = Pass {
            name: "reservation timeout",
            kind: None,
            timeout: config.reservation_timeout(),
        };
        let temp = Pass {
            name: "temporary order reference expired",
            kind: Some(RefKind::TempOrder),
            timeout: config.temp_order_timeout(),
        };
        let cart = Pass {
            name: "cart session expired",
            kind: Some(RefKind::CartSession),
            timeout: config.cart_session_timeout(),
        };

        let candidates = self.engine.store().find_by_status(UnitStatus::Reserved);
        report.expired_reservations = self.run_pass(general, candidates, now, &mut report.failed);

        let candidates = self
            .engine
            .store()
            .find_by_reservation_ref_prefix(TEMP_ORDER_PREFIX);
        report.expired_temp_orders = self.run_pass(temp, candidates, now, &mut report.failed);

        let candidates = self
            .engine
            .store()
            .find_by_reservation_ref_prefix(CART_SESSION_PREFIX);
        report.expired_cart_sessions = self.run_pass(cart, candidates, now, &mut report.failed);

        if report.released() > 0 || !report.failed.is_empty() {
            info!(
                expired_reservations = report.expired_reservations.len(),
                expired_temp_orders = report.expired_temp_orders.len(),
                expired_cart_sessions = report.expired_cart_sessions.len(),
                failed = report.failed.len(),
                "expiration sweep finished"
            );
        }
        report
    }

    fn run_pass<E>(
        &self,
        pass: Pass,
        candidates: Result<Vec<InventoryUnit>, E>,
        now: DateTime<Utc>,
        failed: &mut Vec<UnitId>,
    ) -> Vec<UnitId>
    where
        E: Into<ReservationError>,
    {
        let candidates = match candidates {
            Ok(units) => units,
            Err(err) => {
                let err: ReservationError = err.into();
                warn!(pass = pass.name, error = %err, "sweep scan failed, skipping pass");
                return Vec::new();
            }
        };

        let mut due: BTreeMap<VariantId, Vec<UnitId>> = BTreeMap::new();
        for unit in candidates.iter().filter(|unit| pass.is_due(unit, now)) {
            due.entry(unit.variant_id).or_default().push(unit.id);
        }

        let reason = format!("{} after {} minutes", pass.name, pass.timeout.num_minutes());
        let mut released = Vec::new();
        for (variant_id, ids) in due {
            match self
                .engine
                .expire(variant_id, &ids, &reason, |unit| pass.is_due(unit, now))
            {
                Ok(ids) => released.extend(ids),
                Err(err) => {
                    for unit_id in &ids {
                        warn!(
                            unit_id = unit_id.0,
                            variant_id = variant_id.0,
                            pass = pass.name,
                            error = %err,
                            "could not release expired unit, will retry next sweep"
                        );
                    }
                    failed.extend(ids);
                }
            }
        }
        released
    }
}
