//! Registering and generating units.

use chrono::{Duration, NaiveDate};
use unit_reserve::{AuditAction, NewUnit, Provenance, ReservationError, UnitStatus, VariantId};

use crate::support::{harness, harness_on, start, test_config, ContendedStore};

const V: VariantId = VariantId(31);

#[test]
fn generated_units_get_padded_serials() {
    let h = harness();
    let provenance = Provenance {
        batch_id: Some("LOT-7".into()),
        supplier: Some("Acme".into()),
        manufactured_on: NaiveDate::from_ymd_opt(2024, 1, 15),
        ..Provenance::default()
    };

    let units = h
        .engine
        .generate_units(V, 3, "SN-", provenance.clone(), "import")
        .unwrap();

    let serials: Vec<_> = units.iter().map(|unit| unit.serial.as_str()).collect();
    assert_eq!(serials, vec!["SN-000001", "SN-000002", "SN-000003"]);
    assert!(units.iter().all(|unit| unit.status == UnitStatus::Available));
    assert!(units.iter().all(|unit| unit.provenance == provenance));
    assert_eq!(h.available(V), 3);
    assert_eq!(h.audit.with_action(AuditAction::Created).len(), 3);
}

#[test]
fn generation_skips_serials_already_taken() {
    let h = harness();
    h.engine
        .register_unit(NewUnit::new(V, "SN-000002"), "import")
        .unwrap();

    let units = h
        .engine
        .generate_units(V, 3, "SN-", Provenance::default(), "import")
        .unwrap();

    let serials: Vec<_> = units.iter().map(|unit| unit.serial.as_str()).collect();
    assert_eq!(serials, vec!["SN-000001", "SN-000003", "SN-000004"]);
    assert_eq!(h.available(V), 4);
}

#[test]
fn serials_are_never_reused() {
    let h = harness();
    let unit = h
        .engine
        .register_unit(NewUnit::new(V, "SN-42"), "import")
        .unwrap();
    h.engine
        .change_status(unit.id, UnitStatus::Damaged, "crushed", "warehouse")
        .unwrap();
    h.engine
        .change_status(unit.id, UnitStatus::Disposed, "scrapped", "warehouse")
        .unwrap();

    let err = h
        .engine
        .register_unit(NewUnit::new(VariantId(32), "SN-42"), "import")
        .unwrap_err();

    assert_eq!(err, ReservationError::DuplicateSerial("SN-42".into()));
}

#[test]
fn blank_serial_and_zero_count_are_rejected() {
    let h = harness();
    assert!(matches!(
        h.engine.register_unit(NewUnit::new(V, "  "), "import"),
        Err(ReservationError::InvalidRequest(_))
    ));
    assert!(matches!(
        h.engine
            .generate_units(V, 0, "SN-", Provenance::default(), "import"),
        Err(ReservationError::InvalidRequest(_))
    ));
    assert_eq!(h.available(V), 0);
}

#[test]
fn new_units_are_stamped_with_the_engine_clock() {
    let h = harness();
    h.clock.advance(Duration::minutes(5));

    let registered = h
        .engine
        .register_unit(NewUnit::new(V, "SN-7"), "import")
        .unwrap();
    let generated = h
        .engine
        .generate_units(V, 2, "SN-", Provenance::default(), "import")
        .unwrap();

    let expected = start() + Duration::minutes(5);
    assert_eq!(registered.created_at, expected);
    assert_eq!(registered.updated_at, expected);
    assert!(generated.iter().all(|unit| unit.created_at == expected));
}

#[test]
fn units_inserted_before_a_storage_failure_are_audited() {
    let h = harness_on(ContendedStore::new(0).with_insert_limit(2), test_config());

    let err = h
        .engine
        .generate_units(V, 4, "SN-", Provenance::default(), "import")
        .unwrap_err();

    assert_eq!(err, ReservationError::Storage("disk full".into()));
    assert_eq!(h.available(V), 2);
    let created = h.audit.with_action(AuditAction::Created);
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|entry| entry.actor == "import"));
}
