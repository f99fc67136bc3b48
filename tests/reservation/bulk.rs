//! Bulk ("any N units") and multi-line reservations.

use unit_reserve::{AuditAction, Channel, ReservationError, ReservationRequest, UnitStatus, VariantId};

use crate::support::{cart, harness, online};

const V: VariantId = VariantId(1);

#[test]
fn reserve_three_of_five() {
    let h = harness();
    let units = h.stock(V, 5);
    assert_eq!(h.available(V), 5);

    let reserved = h.engine.reserve_bulk(V, 3, &online("O1")).unwrap();

    assert_eq!(reserved, units[..3].to_vec());
    assert_eq!(h.available(V), 2);
    for unit_id in &reserved {
        let unit = h.unit(*unit_id);
        assert_eq!(unit.status, UnitStatus::Reserved);
        let stamp = unit.active_reservation().unwrap();
        assert_eq!(stamp.channel, Channel::Online);
        assert_eq!(stamp.order_ref, "O1");
        assert_eq!(stamp.reserved_at, crate::support::start());
    }
}

#[test]
fn each_reserved_unit_is_audited() {
    let h = harness();
    h.stock(V, 4);

    let reserved = h.engine.reserve_bulk(V, 2, &online("O1")).unwrap();

    let entries = h.audit.with_action(AuditAction::Reserved);
    assert_eq!(entries.len(), 2);
    for (entry, unit_id) in entries.iter().zip(&reserved) {
        assert_eq!(entry.unit_id, *unit_id);
        assert_eq!(entry.old_value, "AVAILABLE");
        assert_eq!(entry.new_value, "RESERVED ONLINE O1");
        assert_eq!(entry.actor, "checkout");
    }
}

#[test]
fn insufficient_stock_changes_nothing() {
    let h = harness();
    let units = h.stock(V, 2);

    let err = h.engine.reserve_bulk(V, 3, &online("O1")).unwrap_err();

    assert_eq!(
        err,
        ReservationError::InsufficientInventory {
            variant_id: V,
            requested: 3,
            available: 2,
        }
    );
    assert!(err.user_message().contains("Not enough stock"));
    assert_eq!(h.available(V), 2);
    assert!(units.iter().all(|id| h.status(*id) == UnitStatus::Available));
    assert!(h.audit.with_action(AuditAction::Reserved).is_empty());
}

#[test]
fn zero_quantity_is_rejected() {
    let h = harness();
    h.stock(V, 1);
    assert!(matches!(
        h.engine.reserve_bulk(V, 0, &online("O1")),
        Err(ReservationError::InvalidRequest(_))
    ));
}

#[test]
fn unknown_variant_has_nothing_to_reserve() {
    let h = harness();
    let err = h.engine.reserve_bulk(VariantId(404), 1, &online("O1")).unwrap_err();
    assert!(matches!(
        err,
        ReservationError::InsufficientInventory { available: 0, .. }
    ));
}

#[test]
fn lines_for_the_same_variant_are_aggregated() {
    let h = harness();
    let units = h.stock(V, 5);

    let reserved = h
        .engine
        .reserve(
            &[ReservationRequest::any(V, 1), ReservationRequest::any(V, 2)],
            &online("O1"),
        )
        .unwrap();

    assert_eq!(reserved, units[..3].to_vec());
    assert_eq!(h.available(V), 2);
}

#[test]
fn specific_lines_are_served_before_any_lines() {
    let h = harness();
    let units = h.stock(V, 5);

    let reserved = h
        .engine
        .reserve(
            &[
                ReservationRequest::any(V, 2),
                ReservationRequest::specific(V, units[0]),
            ],
            &online("O1"),
        )
        .unwrap();

    // The "any" quantity must not take the unit asked for by id.
    assert_eq!(reserved, vec![units[0], units[1], units[2]]);
    assert_eq!(h.available(V), 2);
}

#[test]
fn aggregated_lines_fail_together() {
    let h = harness();
    let units = h.stock(V, 3);

    let err = h
        .engine
        .reserve(
            &[
                ReservationRequest::specific(V, units[2]),
                ReservationRequest::any(V, 3),
            ],
            &online("O1"),
        )
        .unwrap_err();

    assert_eq!(
        err,
        ReservationError::InsufficientInventory {
            variant_id: V,
            requested: 3,
            available: 2,
        }
    );
    assert_eq!(h.available(V), 3);
}

#[test]
fn availability_check_is_read_only() {
    let h = harness();
    let units = h.stock(V, 3);
    let held = h.engine.reserve_bulk(V, 1, &cart("CART-s1")).unwrap();

    assert!(h
        .engine
        .check_availability(&[ReservationRequest::any(V, 2)])
        .unwrap());
    assert!(!h
        .engine
        .check_availability(&[ReservationRequest::any(V, 3)])
        .unwrap());

    // A unit held by a cart can still be claimed by id.
    assert!(h
        .engine
        .check_availability(&[
            ReservationRequest::specific(V, held[0]),
            ReservationRequest::any(V, 2),
        ])
        .unwrap());
    // An available unit asked for by id comes out of the same pool.
    assert!(!h
        .engine
        .check_availability(&[
            ReservationRequest::specific(V, units[1]),
            ReservationRequest::any(V, 2),
        ])
        .unwrap());
    assert!(!h
        .engine
        .check_availability(&[ReservationRequest::specific(VariantId(2), units[1])])
        .unwrap());

    assert_eq!(h.available(V), 2);
}

#[test]
fn failed_later_variant_releases_earlier_ones() {
    let h = harness();
    let v2 = VariantId(2);
    h.stock(V, 3);
    h.stock(v2, 1);

    let err = h
        .engine
        .reserve(
            &[ReservationRequest::any(V, 2), ReservationRequest::any(v2, 2)],
            &online("O1"),
        )
        .unwrap_err();

    assert_eq!(
        err,
        ReservationError::InsufficientInventory {
            variant_id: v2,
            requested: 2,
            available: 1,
        }
    );
    assert_eq!(h.available(V), 3);
    assert_eq!(h.available(v2), 1);
    assert!(h.engine.units_for_order("O1").unwrap().is_empty());

    let released = h.audit.with_action(AuditAction::Released);
    assert_eq!(released.len(), 2);
    assert!(released.iter().all(|entry| entry.reason.contains("O1")));
    assert!(released.iter().all(|entry| entry.old_value == "RESERVED ONLINE O1"));
}
