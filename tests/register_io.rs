//! Raw register transport and failure propagation

#![cfg(not(feature = "async"))]

mod common;

use common::{read, write};
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use max1704x::registers::{regs, StatusFlags};
use max1704x::{Error, FullScale, Max1704x, DEVICE_ADDR, GENERIC_ERROR};

const ADDRESS_NACK: ErrorKind = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);

fn gauge(expectations: &[I2cTransaction]) -> Max1704x<I2cMock> {
    Max1704x::new(I2cMock::new(expectations), FullScale::V5)
}

#[test]
fn read16_assembles_msb_first() {
    let expectations = [
        I2cTransaction::write_read(DEVICE_ADDR, vec![regs::VERSION], vec![0xAB, 0xCD]),
        I2cTransaction::write_read(DEVICE_ADDR, vec![regs::VERSION], vec![0x00, 0x12]),
    ];
    let mut gauge = gauge(&expectations);

    assert_eq!(gauge.read16(regs::VERSION), Ok(0xABCD));
    assert_eq!(gauge.read16(regs::VERSION), Ok(0x0012));

    gauge.release().done();
}

#[test]
fn write16_sends_pointer_then_msb_then_lsb() {
    let expectations = [I2cTransaction::write(
        DEVICE_ADDR,
        vec![regs::CONFIG, 0x12, 0x34],
    )];
    let mut gauge = gauge(&expectations);

    assert_eq!(gauge.write16(0x1234, regs::CONFIG), Ok(()));

    gauge.release().done();
}

#[test]
fn read16_failure_carries_no_value() {
    let expectations = [read(regs::SOC, 0x0000).with_error(ErrorKind::Other)];
    let mut gauge = gauge(&expectations);

    assert_eq!(gauge.read16(regs::SOC), Err(Error::Bus(ErrorKind::Other)));

    gauge.release().done();
}

#[test]
fn write16_failure_is_reported() {
    let expectations = [write(regs::MODE, 0x4000).with_error(ErrorKind::NoAcknowledge(
        NoAcknowledgeSource::Data,
    ))];
    let mut gauge = gauge(&expectations);

    let err = gauge.write16(0x4000, regs::MODE).unwrap_err();
    assert_eq!(err.code().get(), 3);

    gauge.release().done();
}

#[test]
fn probe_only_addresses_the_device() {
    let expectations = [
        I2cTransaction::write(DEVICE_ADDR, vec![]),
        I2cTransaction::write(DEVICE_ADDR, vec![]).with_error(ADDRESS_NACK),
        I2cTransaction::write(DEVICE_ADDR, vec![]),
    ];
    let mut gauge = gauge(&expectations);

    assert!(gauge.probe());
    assert!(!gauge.probe());
    assert!(gauge.is_connected());

    gauge.release().done();
}

#[test]
fn error_codes_are_never_zero() {
    let cases = [
        (ErrorKind::Overrun, 1),
        (ADDRESS_NACK, 2),
        (ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data), 3),
        (ErrorKind::Bus, 4),
        (ErrorKind::ArbitrationLoss, 4),
        (ErrorKind::Other, 4),
        (
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            GENERIC_ERROR,
        ),
    ];

    for (kind, code) in cases {
        assert_eq!(Error::Bus(kind).code().get(), code);
    }

    assert_eq!(
        Error::<ErrorKind>::InvalidArgument.code().get(),
        GENERIC_ERROR
    );
}

#[test]
fn failed_write_after_successful_read_is_reported() {
    let expectations = [
        read(regs::CONFIG, 0x971C),
        write(regs::CONFIG, 0x979C).with_error(ErrorKind::Other),
    ];
    let mut gauge = gauge(&expectations);

    assert_eq!(gauge.sleep(), Err(Error::Bus(ErrorKind::Other)));

    gauge.release().done();
}

#[test]
fn nacking_bus_fails_every_operation() {
    // Read-modify-write operations stop after the failed read, so only the
    // first transaction of every operation is expected
    let expectations = [
        read(regs::VCELL, 0).with_error(ADDRESS_NACK),
        read(regs::SOC, 0).with_error(ADDRESS_NACK),
        write(regs::MODE, 0x4000).with_error(ADDRESS_NACK),
        read(regs::VERSION, 0).with_error(ADDRESS_NACK),
        read(regs::CONFIG, 0).with_error(ADDRESS_NACK),
        read(regs::CONFIG, 0).with_error(ADDRESS_NACK),
        read(regs::CONFIG, 0).with_error(ADDRESS_NACK),
        read(regs::CONFIG, 0).with_error(ADDRESS_NACK),
        read(regs::CONFIG, 0).with_error(ADDRESS_NACK),
        read(regs::CONFIG, 0).with_error(ADDRESS_NACK),
        write(regs::COMMAND, 0x5400).with_error(ADDRESS_NACK),
        write(regs::COMMAND, 0x5400).with_error(ADDRESS_NACK),
        read(regs::CONFIG, 0).with_error(ADDRESS_NACK),
        read(regs::CONFIG, 0).with_error(ADDRESS_NACK),
        read(regs::VRESET_ID, 0).with_error(ADDRESS_NACK),
        read(regs::VRESET_ID, 0).with_error(ADDRESS_NACK),
        read(regs::VRESET_ID, 0).with_error(ADDRESS_NACK),
        read(regs::VRESET_ID, 0).with_error(ADDRESS_NACK),
        read(regs::VRESET_ID, 0).with_error(ADDRESS_NACK),
        read(regs::CRATE, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::CONFIG, 0).with_error(ADDRESS_NACK),
        read(regs::VRESET_ID, 0).with_error(ADDRESS_NACK),
        read(regs::VRESET_ID, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::STATUS, 0).with_error(ADDRESS_NACK),
        read(regs::CVALRT, 0).with_error(ADDRESS_NACK),
        read(regs::CVALRT, 0).with_error(ADDRESS_NACK),
        read(regs::CVALRT, 0).with_error(ADDRESS_NACK),
        read(regs::CVALRT, 0).with_error(ADDRESS_NACK),
        read(regs::HIBRT, 0).with_error(ADDRESS_NACK),
        read(regs::HIBRT, 0).with_error(ADDRESS_NACK),
        read(regs::HIBRT, 0).with_error(ADDRESS_NACK),
        read(regs::HIBRT, 0).with_error(ADDRESS_NACK),
        write(regs::HIBRT, 0xFFFF).with_error(ADDRESS_NACK),
        write(regs::HIBRT, 0x0000).with_error(ADDRESS_NACK),
        read(regs::MODE, 0).with_error(ADDRESS_NACK),
    ];
    let mut gauge = gauge(&expectations);

    macro_rules! assert_nack {
        ($op:expr) => {
            assert_eq!($op, Err(Error::Bus(ADDRESS_NACK)));
        };
    }

    assert_nack!(gauge.voltage());
    assert_nack!(gauge.state_of_charge());
    assert_nack!(gauge.quick_start());
    assert_nack!(gauge.version());
    assert_nack!(gauge.threshold());
    assert_nack!(gauge.set_threshold(10));
    assert_nack!(gauge.alert(true));
    assert_nack!(gauge.clear_alert());
    assert_nack!(gauge.sleep());
    assert_nack!(gauge.wake());
    assert_nack!(gauge.reset());
    assert_nack!(gauge.soft_reset());
    assert_nack!(gauge.compensation());
    assert_nack!(gauge.set_compensation(0x40));
    assert_nack!(gauge.id());
    assert_nack!(gauge.reset_voltage());
    assert_nack!(gauge.set_reset_voltage(0x40));
    assert_nack!(gauge.enable_comparator());
    assert_nack!(gauge.disable_comparator());
    assert_nack!(gauge.change_rate());
    assert_nack!(gauge.status());
    assert_nack!(gauge.status_flags());
    assert_nack!(gauge.is_reset());
    assert_nack!(gauge.is_voltage_high());
    assert_nack!(gauge.is_voltage_low());
    assert_nack!(gauge.is_voltage_reset());
    assert_nack!(gauge.is_low());
    assert_nack!(gauge.is_change());
    assert_nack!(gauge.enable_alert());
    assert_nack!(gauge.disable_alert());
    assert_nack!(gauge.config_register());
    assert_nack!(gauge.reset_voltage_volts());
    assert_nack!(gauge.is_comparator_enabled());
    assert_nack!(gauge.is_alert_enabled());
    assert_nack!(gauge.clear_status(StatusFlags::RI));
    assert_nack!(gauge.voltage_alert_min());
    assert_nack!(gauge.voltage_alert_max());
    assert_nack!(gauge.set_voltage_alert_min(3.4));
    assert_nack!(gauge.set_voltage_alert_max(4.2));
    assert_nack!(gauge.hibernate_threshold());
    assert_nack!(gauge.set_hibernate_threshold(20.8));
    assert_nack!(gauge.active_threshold());
    assert_nack!(gauge.set_active_threshold(0.075));
    assert_nack!(gauge.enter_hibernate());
    assert_nack!(gauge.exit_hibernate());
    assert_nack!(gauge.is_hibernating());

    gauge.release().done();
}

#[test]
fn status_flags_error_is_not_an_empty_set() {
    let expectations = [read(regs::STATUS, 0).with_error(ErrorKind::Other)];
    let mut gauge = gauge(&expectations);

    assert_ne!(gauge.status_flags(), Ok(StatusFlags::empty()));

    gauge.release().done();
}
