#![cfg_attr(not(test), no_std)]

//! A small driver for Maxim MAX1704x battery gauges (written for MAX17048)
//!
//! The chip is a ModelGauge fuel gauge sitting at I2C address 0x36. All of
//! its registers are 16 bits wide and every operation here boils down to one
//! or two register transactions, nothing is cached on the host side.
//!
//! MAX17043/44 only have VCELL, SOC, MODE, VERSION, CONFIG and COMMAND.
//! MAX17048/49 add hibernation, voltage alerts, CRATE, VRESET/ID and STATUS.
//! MAX17044/49 measure a 2-cell stack, so the voltage LSB is doubled.
//!
//! The driver is blocking by default. Enable the `async` feature to get the
//! same API on top of `embedded-hal-async`.
//!
//! ```ignore
//! let mut gauge = Max1704x::with_chip(i2c, Chip::MAX17048);
//!
//! gauge.quick_start()?;
//! gauge.set_threshold(10)?;
//!
//! let volts = gauge.voltage()?;
//! let soc = gauge.state_of_charge()?;
//! ```

pub(crate) mod fmt;

mod io;
pub mod registers;

use core::num::NonZeroU8;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

#[cfg(not(feature = "async"))]
use embedded_hal::i2c::I2c;
#[cfg(feature = "async")]
use embedded_hal_async::i2c::I2c;

use registers::{bits, commands, regs, Field, StatusFlags};

/// Unshifted 7-bit address, the same for every chip in the family
pub const DEVICE_ADDR: u8 = 0x36;

/// Failure code for anything that does not have a more specific one
pub const GENERIC_ERROR: u8 = 5;

/// Voltage full-scale of the ADC. Fixes the VCELL step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FullScale {
    /// Single cell, 1.25mV per step
    #[default]
    V5,
    /// Two cells in series, 2.5mV per step
    V10,
}

impl FullScale {
    /// Picks the full-scale from its value in volts (5 or 10)
    pub fn from_volts(volts: u8) -> Option<Self> {
        match volts {
            5 => Some(Self::V5),
            10 => Some(Self::V10),
            _ => None,
        }
    }

    pub fn volts(&self) -> u8 {
        match self {
            Self::V5 => 5,
            Self::V10 => 10,
        }
    }

    pub(crate) fn multiplier(&self) -> f32 {
        match self {
            Self::V5 => 1.0,
            Self::V10 => 2.0,
        }
    }
}

/// Known members of the family
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Chip {
    MAX17043,
    MAX17044,
    MAX17048,
    MAX17049,
}

impl Chip {
    pub fn full_scale(&self) -> FullScale {
        match self {
            Self::MAX17043 | Self::MAX17048 => FullScale::V5,
            Self::MAX17044 | Self::MAX17049 => FullScale::V10,
        }
    }

    /// Whether the chip has HIBRT, CVALRT, CRATE, VRESET/ID and STATUS
    pub fn has_extended_registers(&self) -> bool {
        matches!(self, Self::MAX17048 | Self::MAX17049)
    }
}

/// Chip error type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The bus transaction failed, nothing can be said about the register
    Bus(E),
    /// The value does not fit into the register field. Nothing was sent
    InvalidArgument,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::Bus(e)
    }
}

impl<E> Error<E>
where
    E: embedded_hal::i2c::Error,
{
    /// Numeric failure code, in the spirit of Wire's endTransmission():
    ///
    /// 1 - data too long, 2 - address NACK, 3 - data NACK, 4 - other bus
    /// error, 5 - anything else. Zero is left for success.
    pub fn code(&self) -> NonZeroU8 {
        let code = match self {
            Self::Bus(e) => match e.kind() {
                ErrorKind::Overrun => 1,
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => 2,
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => 3,
                ErrorKind::Bus | ErrorKind::ArbitrationLoss | ErrorKind::Other => 4,
                _ => GENERIC_ERROR,
            },
            Self::InvalidArgument => GENERIC_ERROR,
        };

        NonZeroU8::new(code).unwrap_or(NonZeroU8::MIN)
    }
}

/// Chip handle
///
/// The handle keeps no copy of the register contents. It does not lock the
/// bus either: if the bus is shared with other contexts (threads, interrupt
/// handlers), access has to be serialized by the caller, otherwise two
/// interleaved read-modify-write sequences on the same register will lose one
/// of the updates.
pub struct Max1704x<I> {
    i2c: I,
    full_scale: FullScale,
    extended: bool,
    debug: bool,
}

impl<I> Max1704x<I> {
    /// Creates the driver instance. The extended (MAX17048/49) registers are
    /// assumed to be there
    pub fn new(i2c: I, full_scale: FullScale) -> Self {
        Self {
            i2c,
            full_scale,
            extended: true,
            debug: false,
        }
    }

    /// Creates the driver instance for a specific chip
    pub fn with_chip(i2c: I, chip: Chip) -> Self {
        Self {
            i2c,
            full_scale: chip.full_scale(),
            extended: chip.has_extended_registers(),
            debug: false,
        }
    }

    /// Gives the bus back
    pub fn release(self) -> I {
        self.i2c
    }

    pub fn full_scale(&self) -> FullScale {
        self.full_scale
    }

    /// Starts tracing every register access through defmt / log.
    /// Does nothing if neither of them is compiled in
    pub fn enable_debugging(&mut self) {
        self.debug = true;
    }

    pub fn disable_debugging(&mut self) {
        self.debug = false;
    }

    pub fn is_debugging(&self) -> bool {
        self.debug
    }

    /// Extended registers are still accessed on chips that lack them, the
    /// caller gets whatever comes back. We only complain about it
    #[allow(unused_variables)]
    fn check_extended(&self, register: &str) {
        if self.debug && !self.extended {
            warn!("{} is not present on MAX17043/44", register);
        }
    }
}

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "Max1704x",),
    async(feature = "async", keep_self)
)]
impl<I, E> Max1704x<I>
where
    I: I2c<Error = E>,
{
    /// Reads the battery voltage in volts
    pub async fn voltage(&mut self) -> Result<f32, Error<E>> {
        let raw = self.read16(regs::VCELL).await?;
        Ok(registers::vcell_to_volts(raw, self.full_scale))
    }

    /// Reads the state of charge in percent. Not clamped to 0..100
    pub async fn state_of_charge(&mut self) -> Result<f32, Error<E>> {
        let raw = self.read16(regs::SOC).await?;
        Ok(registers::soc_to_percent(raw))
    }

    /// Makes the gauge restart its SOC estimation from the current voltage,
    /// as if the battery was just inserted
    pub async fn quick_start(&mut self) -> Result<(), Error<E>> {
        self.write16(commands::QUICK_START, regs::MODE).await
    }

    /// Gets the production version
    pub async fn version(&mut self) -> Result<u16, Error<E>> {
        self.read16(regs::VERSION).await
    }

    /// Raw contents of the CONFIG register
    pub async fn config_register(&mut self) -> Result<u16, Error<E>> {
        self.read16(regs::CONFIG).await
    }

    /// SOC alert threshold, in percent (1..=32)
    pub async fn threshold(&mut self) -> Result<u8, Error<E>> {
        let athd = self
            .read_field(regs::CONFIG, Field::new(bits::CONFIG_THRESHOLD))
            .await?;

        Ok(registers::decode_threshold(athd))
    }

    /// Sets the SOC alert threshold. Anything outside of 1..=32 percent is
    /// refused without touching the bus
    pub async fn set_threshold(&mut self, percent: u8) -> Result<(), Error<E>> {
        let athd = registers::encode_threshold(percent).ok_or(Error::InvalidArgument)?;

        self.modify_field(regs::CONFIG, Field::new(bits::CONFIG_THRESHOLD), athd)
            .await
    }

    /// Checks whether the alert is latched. With `clear` set, a latched alert
    /// is also cleared - the return value still tells that it was there
    pub async fn alert(&mut self, clear: bool) -> Result<bool, Error<E>> {
        let config = self.read16(regs::CONFIG).await?;
        let pending = config & bits::CONFIG_ALERT != 0;

        if clear && pending {
            self.write16(config & !bits::CONFIG_ALERT, regs::CONFIG)
                .await?;
        }

        Ok(pending)
    }

    pub async fn clear_alert(&mut self) -> Result<(), Error<E>> {
        self.modify_field(regs::CONFIG, Field::new(bits::CONFIG_ALERT), 0)
            .await
    }

    /// Puts the gauge to sleep. On MAX17048/49 this only works if
    /// MODE.EnSleep is set
    pub async fn sleep(&mut self) -> Result<(), Error<E>> {
        self.modify_field(regs::CONFIG, Field::new(bits::CONFIG_SLEEP), 1)
            .await
    }

    pub async fn wake(&mut self) -> Result<(), Error<E>> {
        self.modify_field(regs::CONFIG, Field::new(bits::CONFIG_SLEEP), 0)
            .await
    }

    /// Power-on reset. Every register goes back to its default value.
    ///
    /// The chip may reset before acknowledging the last byte, so a NACK here
    /// does not necessarily mean that the command was lost
    pub async fn reset(&mut self) -> Result<(), Error<E>> {
        if self.debug {
            info!("performing power-on reset...");
        }

        self.write16(commands::POWER_ON_RESET, regs::COMMAND).await
    }

    /// Same thing as [`Self::reset`], under the name MAX17048 datasheet uses
    pub async fn soft_reset(&mut self) -> Result<(), Error<E>> {
        self.reset().await
    }

    /// ModelGauge compensation (RCOMP), the high byte of CONFIG
    pub async fn compensation(&mut self) -> Result<u8, Error<E>> {
        let rcomp = self
            .read_field(regs::CONFIG, Field::new(bits::CONFIG_COMPENSATION))
            .await?;

        Ok(rcomp as u8)
    }

    pub async fn set_compensation(&mut self, rcomp: u8) -> Result<(), Error<E>> {
        self.modify_field(
            regs::CONFIG,
            Field::new(bits::CONFIG_COMPENSATION),
            rcomp as u16,
        )
        .await
    }

    /// Factory-programmed ID, the chip ignores writes to it
    pub async fn id(&mut self) -> Result<u8, Error<E>> {
        self.check_extended("VRESET/ID");

        let id = self
            .read_field(regs::VRESET_ID, Field::new(bits::VRESET_ID))
            .await?;

        Ok(id as u8)
    }

    /// Raw 7-bit VRESET code, 40mV per step
    pub async fn reset_voltage(&mut self) -> Result<u8, Error<E>> {
        self.check_extended("VRESET/ID");

        let code = self
            .read_field(regs::VRESET_ID, Field::new(bits::VRESET))
            .await?;

        Ok(code as u8)
    }

    /// Same as [`Self::reset_voltage`], converted to volts
    pub async fn reset_voltage_volts(&mut self) -> Result<f32, Error<E>> {
        let code = self.reset_voltage().await?;
        Ok(registers::reset_voltage_to_volts(code))
    }

    /// Sets the battery removal detection threshold (7-bit code, 40mV per step).
    /// The comparator enable bit stays as it was
    pub async fn set_reset_voltage(&mut self, code: u8) -> Result<(), Error<E>> {
        if code > registers::RESET_VOLTAGE_MAX {
            return Err(Error::InvalidArgument);
        }

        self.check_extended("VRESET/ID");
        self.modify_field(regs::VRESET_ID, Field::new(bits::VRESET), code as u16)
            .await
    }

    pub async fn enable_comparator(&mut self) -> Result<(), Error<E>> {
        self.check_extended("VRESET/ID");
        self.modify_field(regs::VRESET_ID, Field::new(bits::VRESET_COMPARATOR), 1)
            .await
    }

    pub async fn disable_comparator(&mut self) -> Result<(), Error<E>> {
        self.check_extended("VRESET/ID");
        self.modify_field(regs::VRESET_ID, Field::new(bits::VRESET_COMPARATOR), 0)
            .await
    }

    pub async fn is_comparator_enabled(&mut self) -> Result<bool, Error<E>> {
        self.check_extended("VRESET/ID");

        let bit = self
            .read_field(regs::VRESET_ID, Field::new(bits::VRESET_COMPARATOR))
            .await?;

        Ok(bit != 0)
    }

    /// Charge or discharge rate in percent per hour. Negative while discharging
    pub async fn change_rate(&mut self) -> Result<f32, Error<E>> {
        self.check_extended("CRATE");

        let raw = self.read16(regs::CRATE).await?;
        Ok(registers::crate_to_percent_per_hour(raw))
    }

    /// High byte of STATUS: the sticky flags plus EnVR in bit 6
    pub async fn status(&mut self) -> Result<u8, Error<E>> {
        self.check_extended("STATUS");

        let raw = self.read16(regs::STATUS).await?;
        Ok(registers::status_byte(raw))
    }

    /// Reads the sticky flags. Reading does not clear anything
    pub async fn status_flags(&mut self) -> Result<StatusFlags, Error<E>> {
        self.check_extended("STATUS");

        let raw = self.read16(regs::STATUS).await?;
        Ok(StatusFlags::from(raw))
    }

    /// Clears the given sticky flags, the rest stay untouched
    pub async fn clear_status(&mut self, flags: StatusFlags) -> Result<(), Error<E>> {
        self.check_extended("STATUS");

        let raw = self.read16(regs::STATUS).await?;
        let cleared = raw & !((flags.bits() as u16) << 8);

        self.write16(cleared, regs::STATUS).await
    }

    /// Set after power-up until software clears it
    pub async fn is_reset(&mut self) -> Result<bool, Error<E>> {
        Ok(self.status_flags().await?.contains(StatusFlags::RI))
    }

    pub async fn is_voltage_high(&mut self) -> Result<bool, Error<E>> {
        Ok(self.status_flags().await?.contains(StatusFlags::VH))
    }

    pub async fn is_voltage_low(&mut self) -> Result<bool, Error<E>> {
        Ok(self.status_flags().await?.contains(StatusFlags::VL))
    }

    pub async fn is_voltage_reset(&mut self) -> Result<bool, Error<E>> {
        Ok(self.status_flags().await?.contains(StatusFlags::VR))
    }

    /// SOC went below the alert threshold
    pub async fn is_low(&mut self) -> Result<bool, Error<E>> {
        Ok(self.status_flags().await?.contains(StatusFlags::HD))
    }

    /// SOC changed by at least 1%
    pub async fn is_change(&mut self) -> Result<bool, Error<E>> {
        Ok(self.status_flags().await?.contains(StatusFlags::SC))
    }

    /// Lets voltage-reset events assert the ALRT pin (STATUS.EnVR).
    /// Not to be confused with CONFIG.ALRT which reports the latched alert
    pub async fn enable_alert(&mut self) -> Result<(), Error<E>> {
        self.check_extended("STATUS");
        self.modify_field(regs::STATUS, Field::new(bits::STATUS_ENVR), 1)
            .await
    }

    pub async fn disable_alert(&mut self) -> Result<(), Error<E>> {
        self.check_extended("STATUS");
        self.modify_field(regs::STATUS, Field::new(bits::STATUS_ENVR), 0)
            .await
    }

    pub async fn is_alert_enabled(&mut self) -> Result<bool, Error<E>> {
        self.check_extended("STATUS");

        let bit = self
            .read_field(regs::STATUS, Field::new(bits::STATUS_ENVR))
            .await?;

        Ok(bit != 0)
    }

    /// Lower end of the voltage alert window, in volts
    pub async fn voltage_alert_min(&mut self) -> Result<f32, Error<E>> {
        self.check_extended("CVALRT");

        let code = self
            .read_field(regs::CVALRT, Field::new(bits::HIGH_BYTE))
            .await?;

        Ok(registers::valrt_to_volts(code as u8))
    }

    /// Upper end of the voltage alert window, in volts
    pub async fn voltage_alert_max(&mut self) -> Result<f32, Error<E>> {
        self.check_extended("CVALRT");

        let code = self
            .read_field(regs::CVALRT, Field::new(bits::LOW_BYTE))
            .await?;

        Ok(registers::valrt_to_volts(code as u8))
    }

    /// VL gets set once VCELL drops below this. 20mV steps, up to 5.1V
    pub async fn set_voltage_alert_min(&mut self, volts: f32) -> Result<(), Error<E>> {
        let code = registers::valrt_from_volts(volts).ok_or(Error::InvalidArgument)?;

        self.check_extended("CVALRT");
        self.modify_field(regs::CVALRT, Field::new(bits::HIGH_BYTE), code as u16)
            .await
    }

    /// VH gets set once VCELL goes above this. 20mV steps, up to 5.1V
    pub async fn set_voltage_alert_max(&mut self, volts: f32) -> Result<(), Error<E>> {
        let code = registers::valrt_from_volts(volts).ok_or(Error::InvalidArgument)?;

        self.check_extended("CVALRT");
        self.modify_field(regs::CVALRT, Field::new(bits::LOW_BYTE), code as u16)
            .await
    }

    /// The gauge hibernates once the absolute change rate stays below this
    /// for 6 minutes, in percent per hour
    pub async fn hibernate_threshold(&mut self) -> Result<f32, Error<E>> {
        self.check_extended("HIBRT");

        let code = self
            .read_field(regs::HIBRT, Field::new(bits::HIGH_BYTE))
            .await?;

        Ok(registers::hib_thr_to_percent_per_hour(code as u8))
    }

    pub async fn set_hibernate_threshold(&mut self, rate: f32) -> Result<(), Error<E>> {
        let code = registers::hib_thr_from_percent_per_hour(rate).ok_or(Error::InvalidArgument)?;

        self.check_extended("HIBRT");
        self.modify_field(regs::HIBRT, Field::new(bits::HIGH_BYTE), code as u16)
            .await
    }

    /// The gauge wakes up from hibernation once OCV and VCELL differ by more
    /// than this, in volts
    pub async fn active_threshold(&mut self) -> Result<f32, Error<E>> {
        self.check_extended("HIBRT");

        let code = self
            .read_field(regs::HIBRT, Field::new(bits::LOW_BYTE))
            .await?;

        Ok(registers::act_thr_to_volts(code as u8))
    }

    pub async fn set_active_threshold(&mut self, volts: f32) -> Result<(), Error<E>> {
        let code = registers::act_thr_from_volts(volts).ok_or(Error::InvalidArgument)?;

        self.check_extended("HIBRT");
        self.modify_field(regs::HIBRT, Field::new(bits::LOW_BYTE), code as u16)
            .await
    }

    /// Forces hibernation by maxing out both HIBRT thresholds.
    /// The previous thresholds are lost
    pub async fn enter_hibernate(&mut self) -> Result<(), Error<E>> {
        self.check_extended("HIBRT");
        self.write16(commands::HIBERNATE_ENTER, regs::HIBRT).await
    }

    /// Disables hibernation altogether by zeroing both HIBRT thresholds
    pub async fn exit_hibernate(&mut self) -> Result<(), Error<E>> {
        self.check_extended("HIBRT");
        self.write16(commands::HIBERNATE_EXIT, regs::HIBRT).await
    }

    pub async fn is_hibernating(&mut self) -> Result<bool, Error<E>> {
        self.check_extended("MODE.HibStat");

        let raw = self.read16(regs::MODE).await?;
        Ok(raw & bits::MODE_HIBSTAT != 0)
    }
}
