//! Helpers shared by the integration tests

#![allow(dead_code)]

use embedded_hal_mock::eh1::i2c::Transaction;
use max1704x::DEVICE_ADDR;

/// Register pointer write followed by a 2-byte read, MSB first
pub fn read(register: u8, value: u16) -> Transaction {
    Transaction::write_read(DEVICE_ADDR, vec![register], value.to_be_bytes().to_vec())
}

/// Register pointer followed by the 2-byte payload, MSB first
pub fn write(register: u8, value: u16) -> Transaction {
    let [msb, lsb] = value.to_be_bytes();
    Transaction::write(DEVICE_ADDR, vec![register, msb, lsb])
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}
