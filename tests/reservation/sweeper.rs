//! Expiration sweeps over stale reservations.

use std::thread;
use std::time::{Duration as StdDuration, Instant};

use chrono::Duration;
use unit_reserve::{
    cart_session_ref, temp_order_ref, AuditAction, EngineConfig, ExpirationSweeper, SweeperThread,
    UnitStatus, VariantId, SYSTEM_ACTOR,
};

use crate::support::{cart, harness, harness_with, online, start, test_config};

const V: VariantId = VariantId(21);

/// General timeout longer than the provisional ones, so each pass can be
/// observed on its own.
fn staggered() -> EngineConfig {
    EngineConfig {
        reservation_timeout_minutes: 60,
        temp_order_timeout_minutes: 30,
        cart_session_timeout_minutes: 20,
        ..test_config()
    }
}

#[test]
fn reservation_expires_only_after_the_timeout() {
    let h = harness();
    h.stock(V, 2);
    let reserved = h.engine.reserve_bulk(V, 1, &online("O1")).unwrap();
    let sweeper = ExpirationSweeper::new(h.engine.clone());
    let timeout = Duration::minutes(15);

    let early = sweeper.sweep_once(start() + timeout - Duration::seconds(1));
    assert_eq!(early.released(), 0);
    assert_eq!(h.status(reserved[0]), UnitStatus::Reserved);

    let late = sweeper.sweep_once(start() + timeout + Duration::seconds(1));
    assert_eq!(late.expired_reservations, reserved);
    assert!(late.failed.is_empty());
    assert_eq!(h.status(reserved[0]), UnitStatus::Available);
    assert_eq!(h.available(V), 2);

    let released = h.audit.with_action(AuditAction::Released);
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].actor, SYSTEM_ACTOR);
    assert!(released[0].reason.contains("reservation timeout"));
}

#[test]
fn abandoned_temporary_order_is_released() {
    let h = harness_with(staggered());
    h.stock(V, 2);
    let temp = h
        .engine
        .reserve_bulk(V, 1, &online(&temp_order_ref("attempt-9")))
        .unwrap();
    let order = h.engine.reserve_bulk(V, 1, &online("O1")).unwrap();
    let sweeper = ExpirationSweeper::new(h.engine.clone());

    let report = sweeper.sweep_once(start() + Duration::minutes(31));

    assert_eq!(report.expired_temp_orders, temp);
    assert!(report.expired_reservations.is_empty());
    assert_eq!(h.status(temp[0]), UnitStatus::Available);
    assert_eq!(h.status(order[0]), UnitStatus::Reserved);
}

#[test]
fn abandoned_cart_is_released() {
    let h = harness_with(staggered());
    h.stock(V, 1);
    let held = h
        .engine
        .reserve_bulk(V, 1, &cart(&cart_session_ref("s1")))
        .unwrap();
    let sweeper = ExpirationSweeper::new(h.engine.clone());

    assert_eq!(sweeper.sweep_once(start() + Duration::minutes(19)).released(), 0);
    let report = sweeper.sweep_once(start() + Duration::minutes(21));

    assert_eq!(report.expired_cart_sessions, held);
    assert_eq!(h.available(V), 1);
    let entry = h.audit.with_action(AuditAction::Released).remove(0);
    assert_eq!(entry.actor, SYSTEM_ACTOR);
    assert!(entry.reason.contains("cart session expired"));
}

#[test]
fn converted_cart_is_not_swept_as_a_cart() {
    let h = harness_with(staggered());
    h.stock(V, 1);
    let held = h
        .engine
        .reserve_bulk(V, 1, &cart(&cart_session_ref("s1")))
        .unwrap();

    h.clock.advance(Duration::minutes(15));
    h.engine.reserve_specific(held[0], V, &online("O1")).unwrap();

    let sweeper = ExpirationSweeper::new(h.engine.clone());
    let report = sweeper.sweep_once(start() + Duration::minutes(40));

    assert_eq!(report.released(), 0);
    assert!(h.unit(held[0]).is_reserved_under("O1"));
}

#[test]
fn sweeping_twice_is_harmless() {
    let h = harness();
    h.stock(V, 3);
    h.engine.reserve_bulk(V, 3, &online("O1")).unwrap();
    let sweeper = ExpirationSweeper::new(h.engine.clone());
    let later = start() + Duration::hours(1);

    assert_eq!(sweeper.sweep_once(later).released(), 3);
    assert_eq!(sweeper.sweep_once(later), Default::default());
    assert_eq!(h.available(V), 3);
}

#[test]
fn sold_units_are_never_swept() {
    let h = harness();
    let units = h.stock(V, 1);
    h.engine.reserve_specific(units[0], V, &online("O1")).unwrap();
    assert!(h.engine.confirm_sale(&units, "O1", "checkout").is_complete());

    let report = ExpirationSweeper::new(h.engine.clone()).sweep_once(start() + Duration::days(1));

    assert_eq!(report.released(), 0);
    assert_eq!(h.status(units[0]), UnitStatus::Sold);
}

#[test]
fn background_thread_sweeps_until_stopped() {
    let h = harness();
    h.stock(V, 2);
    h.engine.reserve_bulk(V, 2, &online("O1")).unwrap();
    h.clock.advance(Duration::minutes(16));

    let worker = SweeperThread::spawn(
        ExpirationSweeper::new(h.engine.clone()),
        StdDuration::from_millis(10),
    );

    let deadline = Instant::now() + StdDuration::from_secs(5);
    while h.available(V) < 2 && Instant::now() < deadline {
        thread::sleep(StdDuration::from_millis(5));
    }

    let stats = worker.stop();
    assert!(stats.sweeps >= 1);
    assert_eq!(stats.released, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(h.available(V), 2);
}

#[test]
fn unbounded_timeout_never_expires() {
    let h = harness_with(EngineConfig {
        reservation_timeout_minutes: u64::MAX,
        ..staggered()
    });
    h.stock(V, 2);
    let order = h.engine.reserve_bulk(V, 1, &online("O1")).unwrap();
    let temp = h
        .engine
        .reserve_bulk(V, 1, &online(&temp_order_ref("attempt-1")))
        .unwrap();

    let report = ExpirationSweeper::new(h.engine.clone()).sweep_once(start() + Duration::days(365));

    assert!(report.expired_reservations.is_empty());
    assert_eq!(report.expired_temp_orders, temp);
    assert_eq!(h.status(order[0]), UnitStatus::Reserved);
}
