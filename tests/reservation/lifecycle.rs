//! Sale, release, return and administrative status changes.

use unit_reserve::{AuditAction, ReservationError, ReservationRequest, UnitId, UnitStatus, VariantId};

use crate::support::{harness, online};

const V: VariantId = VariantId(11);

#[test]
fn confirm_sale_reports_each_unit() {
    let h = harness();
    let units = h.stock(V, 4);
    h.engine.reserve_bulk(V, 2, &online("O1")).unwrap();
    h.engine.reserve_specific(units[3], V, &online("O2")).unwrap();
    let missing = UnitId(999);

    let outcome = h
        .engine
        .confirm_sale(&[units[0], missing, units[1], units[2], units[3]], "O1", "checkout");

    assert_eq!(outcome.succeeded, vec![units[0], units[1]]);
    assert!(!outcome.is_complete());
    assert_eq!(
        outcome.error_for(missing),
        Some(&ReservationError::UnitNotFound(missing))
    );
    assert_eq!(
        outcome.error_for(units[2]),
        Some(&ReservationError::InvalidTransition {
            unit_id: units[2],
            from: UnitStatus::Available,
            to: UnitStatus::Sold,
        })
    );
    assert!(matches!(
        outcome.error_for(units[3]),
        Some(ReservationError::OrderMismatch { .. })
    ));

    assert_eq!(h.status(units[0]), UnitStatus::Sold);
    assert_eq!(h.status(units[1]), UnitStatus::Sold);
    assert_eq!(h.status(units[3]), UnitStatus::Reserved);
    assert_eq!(h.audit.with_action(AuditAction::Sold).len(), 2);
}

#[test]
fn strict_release_returns_units_to_stock() {
    let h = harness();
    h.stock(V, 3);
    let reserved = h.engine.reserve_bulk(V, 2, &online("O1")).unwrap();

    let released = h.engine.release(&reserved, "customer cancelled", "support").unwrap();

    assert_eq!(released, reserved);
    assert_eq!(h.available(V), 3);
    let entries = h.audit.with_action(AuditAction::Released);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].old_value, "RESERVED ONLINE O1");
    assert_eq!(entries[0].new_value, "AVAILABLE");
    assert_eq!(entries[0].reason, "customer cancelled");
}

#[test]
fn strict_release_rejects_units_that_are_not_reserved() {
    let h = harness();
    let units = h.stock(V, 3);
    h.engine.reserve_specific(units[0], V, &online("O1")).unwrap();

    let err = h
        .engine
        .release(&[units[0], units[1]], "cancel", "support")
        .unwrap_err();

    assert_eq!(
        err,
        ReservationError::NotReserved {
            unit_id: units[1],
            status: UnitStatus::Available,
        }
    );
    assert_eq!(h.status(units[0]), UnitStatus::Reserved);
}

#[test]
fn safe_release_is_idempotent() {
    let h = harness();
    let units = h.stock(V, 2);
    h.engine.reserve_specific(units[0], V, &online("O1")).unwrap();

    let first = h
        .engine
        .release_safe(&[units[0], units[1], UnitId(999)], "cleanup", "support")
        .unwrap();
    let second = h
        .engine
        .release_safe(&[units[0], units[1]], "cleanup", "support")
        .unwrap();

    assert_eq!(first, vec![units[0]]);
    assert!(second.is_empty());
    assert_eq!(h.available(V), 2);
    assert_eq!(h.audit.with_action(AuditAction::Released).len(), 1);
}

#[test]
fn sold_unit_returns_to_stock_through_returned() {
    let h = harness();
    let units = h.stock(V, 1);
    h.engine.reserve_specific(units[0], V, &online("O1")).unwrap();
    assert!(h.engine.confirm_sale(&units, "O1", "checkout").is_complete());
    assert_eq!(h.available(V), 0);

    let returned = h.engine.return_to_stock(&units, "refund", "support").unwrap();

    assert_eq!(returned, units);
    assert_eq!(h.status(units[0]), UnitStatus::Available);
    let steps: Vec<_> = h
        .audit
        .with_action(AuditAction::Returned)
        .into_iter()
        .map(|entry| (entry.old_value, entry.new_value))
        .collect();
    assert_eq!(
        steps,
        vec![
            ("SOLD".to_string(), "RETURNED".to_string()),
            ("RETURNED".to_string(), "AVAILABLE".to_string()),
        ]
    );
}

#[test]
fn only_sold_or_returned_units_can_be_returned() {
    let h = harness();
    let units = h.stock(V, 1);
    h.engine.reserve_specific(units[0], V, &online("O1")).unwrap();

    let err = h.engine.return_to_stock(&units, "refund", "support").unwrap_err();

    assert_eq!(
        err,
        ReservationError::InvalidTransition {
            unit_id: units[0],
            from: UnitStatus::Reserved,
            to: UnitStatus::Returned,
        }
    );
    assert_eq!(h.status(units[0]), UnitStatus::Reserved);
}

#[test]
fn administrative_changes_follow_the_transition_table() {
    let h = harness();
    let units = h.stock(V, 1);
    let id = units[0];

    let damaged = h
        .engine
        .change_status(id, UnitStatus::Damaged, "water damage", "warehouse")
        .unwrap();
    assert_eq!(damaged.status, UnitStatus::Damaged);
    assert_eq!(h.available(V), 0);

    h.engine
        .change_status(id, UnitStatus::Disposed, "written off", "warehouse")
        .unwrap();

    let err = h
        .engine
        .change_status(id, UnitStatus::Available, "oops", "warehouse")
        .unwrap_err();
    assert_eq!(
        err,
        ReservationError::InvalidTransition {
            unit_id: id,
            from: UnitStatus::Disposed,
            to: UnitStatus::Available,
        }
    );
    assert_eq!(h.status(id), UnitStatus::Disposed);
    assert_eq!(h.audit.with_action(AuditAction::StatusChanged).len(), 2);
}

#[test]
fn reservation_and_sale_are_not_administrative_changes() {
    let h = harness();
    let units = h.stock(V, 1);
    for to in [UnitStatus::Reserved, UnitStatus::Sold] {
        assert!(matches!(
            h.engine.change_status(units[0], to, "shortcut", "admin"),
            Err(ReservationError::InvalidRequest(_))
        ));
    }
    assert_eq!(h.status(units[0]), UnitStatus::Available);
}

#[test]
fn cancelling_an_order_releases_all_its_units() {
    let h = harness();
    h.stock(V, 3);
    h.stock(VariantId(12), 2);
    h.engine
        .reserve(
            &[
                ReservationRequest::any(V, 2),
                ReservationRequest::any(VariantId(12), 1),
            ],
            &online("O1"),
        )
        .unwrap();
    let other = h.engine.reserve_bulk(V, 1, &online("O2")).unwrap();

    let released = h.engine.release_order("O1", "order cancelled", "support").unwrap();

    assert_eq!(released.len(), 3);
    assert!(h.engine.units_for_order("O1").unwrap().is_empty());
    assert_eq!(h.engine.units_for_order("O2").unwrap()[0].id, other[0]);
    assert_eq!(h.available(V), 2);
    assert_eq!(h.available(VariantId(12)), 2);
}

#[test]
fn stock_summary_counts_every_status() {
    let h = harness();
    let units = h.stock(V, 4);
    h.engine.reserve_specific(units[0], V, &online("O1")).unwrap();
    h.engine.reserve_specific(units[1], V, &online("O1")).unwrap();
    h.engine.confirm_sale(&[units[1]], "O1", "checkout");
    h.engine
        .change_status(units[2], UnitStatus::DisplayUnit, "window", "store")
        .unwrap();

    let summary = h.engine.stock_summary(V).unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.available(), 1);
    assert_eq!(summary.count(UnitStatus::Reserved), 1);
    assert_eq!(summary.count(UnitStatus::Sold), 1);
    assert_eq!(summary.count(UnitStatus::DisplayUnit), 1);
    assert_eq!(summary.count(UnitStatus::Damaged), 0);
    assert_eq!(h.engine.units_for_variant(V).unwrap().len(), 4);
}

#[test]
fn repeated_ids_are_released_once() {
    let h = harness();
    let units = h.stock(V, 2);
    h.engine.reserve_specific(units[0], V, &online("O1")).unwrap();

    let released = h
        .engine
        .release_safe(&[units[0], units[0]], "cleanup", "support")
        .unwrap();

    assert_eq!(released, vec![units[0]]);
    assert_eq!(h.status(units[0]), UnitStatus::Available);
    assert_eq!(h.audit.with_action(AuditAction::Released).len(), 1);

    h.engine.reserve_specific(units[1], V, &online("O2")).unwrap();
    let strict = h
        .engine
        .release(&[units[1], units[1]], "cancel", "support")
        .unwrap();
    assert_eq!(strict, vec![units[1]]);
    assert_eq!(h.available(V), 2);
}

#[test]
fn repeated_ids_are_returned_once() {
    let h = harness();
    let units = h.stock(V, 1);
    h.engine.reserve_specific(units[0], V, &online("O1")).unwrap();
    assert!(h
        .engine
        .confirm_sale(&[units[0], units[0]], "O1", "checkout")
        .is_complete());

    let returned = h
        .engine
        .return_to_stock(&[units[0], units[0]], "refund", "support")
        .unwrap();

    assert_eq!(returned, vec![units[0]]);
    assert_eq!(h.status(units[0]), UnitStatus::Available);
    assert_eq!(h.audit.with_action(AuditAction::Returned).len(), 2);
}
