//! These are low-level definitions for MAX17043 and similar chips
//!
//! All registers are 16 bits wide and are transferred MSB first. Everything
//! in here is a pure function of the raw register contents.

use crate::fmt::bitflags;
use crate::FullScale;

/// This is a list of registers supported by the gauge
pub mod regs {
    pub const VCELL: u8 = 0x02;
    pub const SOC: u8 = 0x04;
    pub const MODE: u8 = 0x06;
    pub const VERSION: u8 = 0x08;
    pub const CONFIG: u8 = 0x0C;
    pub const COMMAND: u8 = 0xFE;

    // MAX17048/49 only
    pub const HIBRT: u8 = 0x0A;
    pub const CVALRT: u8 = 0x14;
    pub const CRATE: u8 = 0x16;
    pub const VRESET_ID: u8 = 0x18;
    pub const STATUS: u8 = 0x1A;
}

/// Command words, written as a whole into MODE or COMMAND
pub mod commands {
    pub const QUICK_START: u16 = 0x4000;
    pub const POWER_ON_RESET: u16 = 0x5400;

    pub const HIBERNATE_ENTER: u16 = 0xFFFF;
    pub const HIBERNATE_EXIT: u16 = 0x0000;
}

/// Bit positions inside the 16-bit registers
pub mod bits {
    pub const MODE_HIBSTAT: u16 = 1 << 12;

    pub const CONFIG_COMPENSATION: u16 = 0xFF00;
    pub const CONFIG_SLEEP: u16 = 1 << 7;
    pub const CONFIG_ALERT: u16 = 1 << 5;
    pub const CONFIG_THRESHOLD: u16 = 0x001F;

    pub const VRESET: u16 = 0xFE00;
    pub const VRESET_COMPARATOR: u16 = 1 << 8;
    pub const VRESET_ID: u16 = 0x00FF;

    pub const STATUS_FLAGS: u16 = 0x3F00;
    pub const STATUS_ENVR: u16 = 1 << 14;

    pub const HIGH_BYTE: u16 = 0xFF00;
    pub const LOW_BYTE: u16 = 0x00FF;
}

bitflags! {
    /// Sticky alert flags of the STATUS register (its high byte)
    pub struct StatusFlags: u8 {
        /// Set on power-up, cleared by software once the chip is configured
        const RI = 1 << 0;
        /// VCELL went above VALRT.MAX
        const VH = 1 << 1;
        /// VCELL went below VALRT.MIN
        const VL = 1 << 2;
        /// Voltage reset, i.e battery was removed and inserted again
        const VR = 1 << 3;
        /// SOC crossed the ATHD threshold
        const HD = 1 << 4;
        /// SOC changed by at least 1%
        const SC = 1 << 5;
    }
}

impl From<u16> for StatusFlags {
    fn from(raw: u16) -> Self {
        StatusFlags::from_bits_truncate(status_byte(raw))
    }
}

/// Lowest alert threshold the ATHD field can express, in percent
pub const THRESHOLD_MIN: u8 = 1;
/// Highest alert threshold the ATHD field can express, in percent
pub const THRESHOLD_MAX: u8 = 32;

pub const RESET_VOLTAGE_MAX: u8 = 0x7F;

/// VCELL LSB at 5V full-scale, after dropping the 4 unused bits
const VCELL_STEP_V: f32 = 0.00125;
/// VRESET LSB
const VRESET_STEP_V: f32 = 0.04;
/// VALRT.MIN / VALRT.MAX LSB
const VALRT_STEP_V: f32 = 0.02;
/// HIBRT.ActThr LSB
const ACT_THR_STEP_V: f32 = 0.00125;
/// CRATE and HIBRT.HibThr LSB
const RATE_STEP_PCT: f32 = 0.208;

/// Where a field sits in a register and how wide it is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    mask: u16,
}

impl Field {
    pub const fn new(mask: u16) -> Self {
        Self { mask }
    }

    const fn shift(&self) -> u32 {
        self.mask.trailing_zeros()
    }

    /// Extracts the field from a register value, right-aligned
    pub const fn get(&self, raw: u16) -> u16 {
        (raw & self.mask) >> self.shift()
    }

    /// Replaces the field inside `raw` with `value`, every other bit is kept
    pub const fn set(&self, raw: u16, value: u16) -> u16 {
        (raw & !self.mask) | ((value << self.shift()) & self.mask)
    }
}

/// Encodes the alert threshold (in percent) into the ATHD field.
/// Returns `None` if the threshold cannot be represented
pub fn encode_threshold(percent: u8) -> Option<u16> {
    if (THRESHOLD_MIN..=THRESHOLD_MAX).contains(&percent) {
        Some((THRESHOLD_MAX - percent) as u16)
    } else {
        None
    }
}

/// Decodes the 5-bit ATHD field back into percent
pub fn decode_threshold(field: u16) -> u8 {
    THRESHOLD_MAX - (field & bits::CONFIG_THRESHOLD) as u8
}

/// Cell voltage in volts. Only the upper 12 bits of VCELL carry the conversion result
pub fn vcell_to_volts(raw: u16, full_scale: FullScale) -> f32 {
    (raw >> 4) as f32 * VCELL_STEP_V * full_scale.multiplier()
}

/// State of charge in percent. High byte is whole percent, low byte is 1/256%
pub fn soc_to_percent(raw: u16) -> f32 {
    raw as f32 / 256.0
}

/// CRATE is a two's complement number, positive while charging
pub fn crate_to_percent_per_hour(raw: u16) -> f32 {
    (raw as i16) as f32 * RATE_STEP_PCT
}

/// The status flags live in the high byte, EnVR included
pub fn status_byte(raw: u16) -> u8 {
    ((raw & (bits::STATUS_FLAGS | bits::STATUS_ENVR)) >> 8) as u8
}

pub fn reset_voltage_to_volts(code: u8) -> f32 {
    (code & RESET_VOLTAGE_MAX) as f32 * VRESET_STEP_V
}

/// Converts a quantity into a register code of a given step, rejecting
/// anything that does not fit into `max`
fn quantize(value: f32, step: f32, max: u16) -> Option<u16> {
    // The upper bound gets a sliver of slack so that the exact maximum
    // survives f32 rounding, anything above it is refused before rounding
    let limit = max as f32 * step + step * 1e-3;

    if value.is_nan() || value < 0.0 || value > limit {
        return None;
    }

    let code = (value / step + 0.5) as u32;
    Some(code.min(max as u32) as u16)
}

pub fn valrt_from_volts(volts: f32) -> Option<u8> {
    quantize(volts, VALRT_STEP_V, 0xFF).map(|code| code as u8)
}

pub fn valrt_to_volts(code: u8) -> f32 {
    code as f32 * VALRT_STEP_V
}

pub fn act_thr_from_volts(volts: f32) -> Option<u8> {
    quantize(volts, ACT_THR_STEP_V, 0xFF).map(|code| code as u8)
}

pub fn act_thr_to_volts(code: u8) -> f32 {
    code as f32 * ACT_THR_STEP_V
}

pub fn hib_thr_from_percent_per_hour(rate: f32) -> Option<u8> {
    quantize(rate, RATE_STEP_PCT, 0xFF).map(|code| code as u8)
}

pub fn hib_thr_to_percent_per_hour(code: u8) -> f32 {
    code as f32 * RATE_STEP_PCT
}
