//! Raw register access. Every register is 16 bits wide and spans two
//! consecutive byte addresses, MSB first. The chip auto-increments the
//! register pointer, so a register is always moved in one go.

use byteorder::{BigEndian, ByteOrder};

#[cfg(not(feature = "async"))]
use embedded_hal::i2c::I2c;
#[cfg(feature = "async")]
use embedded_hal_async::i2c::I2c;

use crate::registers::Field;
use crate::{Error, Max1704x, DEVICE_ADDR};

#[maybe_async_cfg::maybe(
    sync(cfg(not(feature = "async")), self = "Max1704x",),
    async(feature = "async", keep_self)
)]
impl<I, E> Max1704x<I>
where
    I: I2c<Error = E>,
{
    /// Writes 16 bits into the register: pointer, then MSB, then LSB
    pub async fn write16(&mut self, value: u16, address: u8) -> Result<(), Error<E>> {
        let mut request = [address, 0, 0];
        BigEndian::write_u16(&mut request[1..], value);

        if self.debug {
            trace!("write16: 0x{:02x} <- 0x{:04x}", address, value);
        }

        if let Err(e) = self.i2c.write(DEVICE_ADDR, &request).await {
            if self.debug {
                debug!("write16: bus error on 0x{:02x}", address);
            }

            return Err(Error::Bus(e));
        }

        Ok(())
    }

    /// Sets the register pointer and reads 16 bits back. Nothing is returned
    /// unless both phases went through
    pub async fn read16(&mut self, address: u8) -> Result<u16, Error<E>> {
        let mut response = [0, 0];

        if let Err(e) = self
            .i2c
            .write_read(DEVICE_ADDR, &[address], &mut response)
            .await
        {
            if self.debug {
                debug!("read16: bus error on 0x{:02x}", address);
            }

            return Err(Error::Bus(e));
        }

        let value = BigEndian::read_u16(&response);

        if self.debug {
            trace!("read16: 0x{:02x} -> 0x{:04x}", address, value);
        }

        Ok(value)
    }

    /// Read-modify-write of a single field. `value` is right-aligned, every
    /// bit outside of the field is written back as it was read
    pub(crate) async fn modify_field(
        &mut self,
        address: u8,
        field: Field,
        value: u16,
    ) -> Result<(), Error<E>> {
        let raw = self.read16(address).await?;
        self.write16(field.set(raw, value), address).await
    }

    pub(crate) async fn read_field(&mut self, address: u8, field: Field) -> Result<u16, Error<E>> {
        let raw = self.read16(address).await?;
        Ok(field.get(raw))
    }

    /// Checks whether anything acknowledges the gauge address. No register
    /// is touched, so this says nothing about the chip being healthy
    pub async fn probe(&mut self) -> bool {
        let present = self.i2c.write(DEVICE_ADDR, &[]).await.is_ok();

        if self.debug {
            debug!("probe: device present = {}", present);
        }

        present
    }

    pub async fn is_connected(&mut self) -> bool {
        self.probe().await
    }
}
