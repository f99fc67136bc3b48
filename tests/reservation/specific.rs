//! Reserving particular units, including cart and temporary-order
//! conversion.

use chrono::Duration;
use unit_reserve::{
    cart_session_ref, temp_order_ref, AuditAction, Channel, ReservationContext, ReservationError,
    UnitId, UnitStatus, VariantId,
};

use crate::support::{cart, harness, online};

const V: VariantId = VariantId(7);

#[test]
fn available_unit_is_reserved() {
    let h = harness();
    let units = h.stock(V, 3);

    let id = h.engine.reserve_specific(units[1], V, &online("O1")).unwrap();

    assert_eq!(id, units[1]);
    assert!(h.unit(units[1]).is_reserved_under("O1"));
    assert_eq!(h.status(units[0]), UnitStatus::Available);
    assert_eq!(h.available(V), 2);
}

#[test]
fn unit_of_another_variant_is_rejected() {
    let h = harness();
    let other = h.stock(VariantId(8), 1);
    h.stock(V, 1);

    let err = h.engine.reserve_specific(other[0], V, &online("O1")).unwrap_err();

    assert_eq!(
        err,
        ReservationError::VariantMismatch {
            unit_id: other[0],
            expected: V,
            actual: VariantId(8),
        }
    );
    assert_eq!(h.status(other[0]), UnitStatus::Available);
}

#[test]
fn unknown_unit_is_not_found() {
    let h = harness();
    assert_eq!(
        h.engine.reserve_specific(UnitId(999), V, &online("O1")),
        Err(ReservationError::UnitNotFound(UnitId(999)))
    );
}

#[test]
fn cart_reservation_converts_to_order_in_place() {
    let h = harness();
    let units = h.stock(V, 5);
    let session = cart_session_ref("abc");
    h.engine.reserve_specific(units[2], V, &cart(&session)).unwrap();
    assert_eq!(h.available(V), 4);

    h.clock.advance(Duration::minutes(3));
    h.engine.reserve_specific(units[2], V, &online("O7")).unwrap();

    let unit = h.unit(units[2]);
    assert_eq!(unit.status, UnitStatus::Reserved);
    let stamp = unit.active_reservation().unwrap();
    assert_eq!(stamp.channel, Channel::Online);
    assert_eq!(stamp.order_ref, "O7");
    assert_eq!(stamp.reserved_at, crate::support::start() + Duration::minutes(3));
    assert_eq!(h.available(V), 4);

    // The unit went straight from the cart to the order.
    let actions: Vec<_> = h
        .audit
        .for_unit(units[2])
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(
        actions,
        vec![AuditAction::Created, AuditAction::Reserved, AuditAction::Restamped]
    );
    let restamp = h.audit.with_action(AuditAction::Restamped).remove(0);
    assert_eq!(restamp.old_value, format!("RESERVED CART {}", session));
    assert_eq!(restamp.new_value, "RESERVED ONLINE O7");
}

#[test]
fn temporary_order_reference_is_replaced_by_final_order() {
    let h = harness();
    let units = h.stock(V, 2);
    let temp = temp_order_ref("attempt-1");
    h.engine.reserve_specific(units[0], V, &online(&temp)).unwrap();

    h.engine.reserve_specific(units[0], V, &online("O8")).unwrap();

    assert!(h.unit(units[0]).is_reserved_under("O8"));
    assert!(h.engine.units_for_order(&temp).unwrap().is_empty());
}

#[test]
fn cart_hold_cannot_move_to_another_cart() {
    let h = harness();
    let units = h.stock(V, 2);
    let first = cart_session_ref("s1");
    h.engine.reserve_specific(units[0], V, &cart(&first)).unwrap();

    let err = h
        .engine
        .reserve_specific(units[0], V, &cart(&cart_session_ref("s2")))
        .unwrap_err();

    assert_eq!(
        err,
        ReservationError::UnitNotReservable {
            unit_id: units[0],
            status: UnitStatus::Reserved,
        }
    );
    assert!(h.unit(units[0]).is_reserved_under(&first));

    let temp = temp_order_ref("attempt-2");
    h.engine.reserve_specific(units[0], V, &online(&temp)).unwrap();
    assert!(h.unit(units[0]).is_reserved_under(&temp));
}

#[test]
fn cart_prefix_outside_the_cart_channel_is_not_convertible() {
    let h = harness();
    let units = h.stock(V, 1);
    let pos = ReservationContext::new(Channel::Pos, cart_session_ref("s9"), "till-4");
    h.engine.reserve_specific(units[0], V, &pos).unwrap();

    let err = h.engine.reserve_specific(units[0], V, &online("O1")).unwrap_err();

    assert_eq!(
        err,
        ReservationError::UnitNotReservable {
            unit_id: units[0],
            status: UnitStatus::Reserved,
        }
    );
}

#[test]
fn unit_held_by_a_final_order_is_not_reservable() {
    let h = harness();
    let units = h.stock(V, 1);
    h.engine.reserve_specific(units[0], V, &online("O1")).unwrap();

    let err = h.engine.reserve_specific(units[0], V, &online("O2")).unwrap_err();

    assert!(matches!(
        err,
        ReservationError::UnitNotReservable {
            status: UnitStatus::Reserved,
            ..
        }
    ));
    assert!(h.unit(units[0]).is_reserved_under("O1"));
}

#[test]
fn sold_and_damaged_units_are_not_reservable() {
    let h = harness();
    let units = h.stock(V, 2);
    h.engine.reserve_specific(units[0], V, &online("O1")).unwrap();
    assert!(h.engine.confirm_sale(&[units[0]], "O1", "checkout").is_complete());
    h.engine
        .change_status(units[1], UnitStatus::Damaged, "dropped", "warehouse")
        .unwrap();

    for (unit_id, status) in [(units[0], UnitStatus::Sold), (units[1], UnitStatus::Damaged)] {
        assert_eq!(
            h.engine.reserve_specific(unit_id, V, &online("O2")),
            Err(ReservationError::UnitNotReservable { unit_id, status })
        );
    }
}
