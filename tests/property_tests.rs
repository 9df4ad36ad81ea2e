//! Property behavior through the aggregate: caching, translation and validation.

mod common;

use common::*;
use laser_remote::models::*;
use laser_remote::{
    ErrorKind, EnumerationItem, EnumerationTable, LaserModel, Property, ShutterPersistence,
    SimulatedLaser, Stereotype,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn test_cached_get_issues_one_command() {
    let device = SimulatedLaser::new();
    let mut laser = laser_on(&device, LaserModel::Series06, ShutterPersistence::Volatile);

    device.clear_history();
    assert_eq!(laser.get(SERIAL_NUMBER).unwrap(), "20345");
    assert_eq!(laser.get(SERIAL_NUMBER).unwrap(), "20345");
    assert_eq!(device.history(), vec!["gsn?"]);
}

#[test]
fn test_explicit_invalidation_refetches() {
    let device = SimulatedLaser::new();
    let mut laser = laser_on(&device, LaserModel::Series06, ShutterPersistence::Volatile);
    laser.get(FIRMWARE_VERSION).unwrap();

    device.set_register("gfv", "9.002");
    assert_eq!(laser.get(FIRMWARE_VERSION).unwrap(), "9.001");

    laser.invalidate(FIRMWARE_VERSION).unwrap();
    assert_eq!(laser.get(FIRMWARE_VERSION).unwrap(), "9.002");

    device.set_register("gfv", "9.003");
    laser.invalidate_all();
    assert_eq!(laser.get(FIRMWARE_VERSION).unwrap(), "9.003");
}

#[test]
fn test_successful_set_forces_fresh_read() {
    let device = SimulatedLaser::new();
    let dispatcher = dispatcher_for(&device);
    let mut laser = laser_remote::Laser::new(LaserModel::Series06, dispatcher);
    laser
        .register(
            Property::numeric(CURRENT_SETPOINT, Stereotype::Real, "glc?", "slc")
                .unwrap()
                .cached(true),
        )
        .unwrap();

    assert_eq!(laser.get(CURRENT_SETPOINT).unwrap(), "50.0");
    laser.set(CURRENT_SETPOINT, "60.5").unwrap();

    device.clear_history();
    assert_eq!(laser.get(CURRENT_SETPOINT).unwrap(), "60.5");
    assert_eq!(device.history(), vec!["glc?"]);
}

#[test]
fn test_enumeration_round_trips_every_item() {
    let device = SimulatedLaser::new();
    let mut laser = laser_on(&device, LaserModel::Series06, ShutterPersistence::Volatile);

    for label in ["1 kOhm", "50 Ohm"] {
        laser.set(ANALOG_IMPEDANCE, label).unwrap();
        assert_eq!(laser.get(ANALOG_IMPEDANCE).unwrap(), label);
    }
    for label in ["Constant Current", "Modulation", "Constant Power"] {
        laser.set(RUN_MODE, label).unwrap();
        assert_eq!(laser.get(RUN_MODE).unwrap(), label);
    }
    assert_eq!(device.register("galis").as_deref(), Some("1"));
    assert_eq!(device.register("gam").as_deref(), Some("1"));
}

#[test]
fn test_unmapped_device_value_is_protocol_mismatch() {
    let device = SimulatedLaser::new();
    let mut laser = laser_on(&device, LaserModel::Series06, ShutterPersistence::Volatile);

    device.set_register("gam", "9");
    let err = laser.get(RUN_MODE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolMismatch);

    device.set_register("gom", "42");
    let err = laser.get(OPERATING_STATUS).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolMismatch);
}

#[test]
fn test_syntax_error_is_unsupported_command() {
    let (_, mut dispatcher) = dispatcher_replying("Syntax error");
    let prop = Property::readable(MODEL, Stereotype::Text, "glm?");
    let err = prop.get(&mut dispatcher).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedCommand);
}

#[test]
fn test_read_only_properties_reject_writes() {
    let device = SimulatedLaser::new();
    let mut laser = laser_on(&device, LaserModel::Series06, ShutterPersistence::Volatile);
    device.clear_history();

    for name in [VENDOR, MODEL, MEASURED_CURRENT, OPERATING_STATUS, MAXIMUM_POWER] {
        let err = laser.set(name, "1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadOnly, "{name}");
    }
    assert!(device.history().is_empty());
}

#[test]
fn test_range_boundaries() {
    let device = SimulatedLaser::new();
    let mut laser = laser_on(&device, LaserModel::Series06, ShutterPersistence::Volatile);

    laser.set(CURRENT_SETPOINT, "0").unwrap();
    laser.set(CURRENT_SETPOINT, "150.0").unwrap();

    device.clear_history();
    for value in ["-0.0001", "150.0001", "lots"] {
        let err = laser.set(CURRENT_SETPOINT, value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue, "{value}");
    }
    assert!(device.history().is_empty());
}

#[test]
fn test_fixed_range_on_cw_model() {
    let device = SimulatedLaser::new();
    let mut laser = laser_on(&device, LaserModel::Series08, ShutterPersistence::Volatile);

    laser.set(CURRENT_SETPOINT, "3000").unwrap();
    assert_eq!(
        laser.set(CURRENT_SETPOINT, "3000.5").unwrap_err().kind(),
        ErrorKind::InvalidValue
    );
}

#[test]
fn test_enum_without_default_command_sends_item_command() {
    let device = SimulatedLaser::new();
    let mut laser = laser_on(&device, LaserModel::Skyra, ShutterPersistence::Volatile);

    device.clear_history();
    laser.set(EMISSION, "Off").unwrap();
    laser.set(AUTOSTART, "Disabled").unwrap();
    assert_eq!(device.history(), vec!["l0", "sas 0"]);
}

#[test]
fn test_enumeration_registration_rejects_duplicates() {
    let err = EnumerationTable::new([
        EnumerationItem::new("0", "Disabled"),
        EnumerationItem::new("0", "Off"),
    ])
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_power_setpoint_accepted_iff_in_range(value in -0.05f64..0.12) {
        let device = SimulatedLaser::new();
        let mut laser = laser_on(&device, LaserModel::Series06, ShutterPersistence::Volatile);

        let text = format!("{value}");
        let parsed: f64 = text.parse().unwrap();
        let in_range = (0.0..=0.06).contains(&parsed);
        match laser.set(POWER_SETPOINT, &text) {
            Ok(()) => prop_assert!(in_range),
            Err(e) => {
                prop_assert!(!in_range);
                prop_assert_eq!(e.kind(), ErrorKind::InvalidValue);
            }
        }
    }
}
