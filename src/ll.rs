//! Low-level register map and bus transport for the AP3216C

use embedded_hal::i2c::{ErrorType, I2c};

#[cfg(feature = "async")]
use embedded_hal_async::i2c::I2c as AsyncI2c;

/// Default I2C address of the AP3216C
pub const I2C_ADDRESS: u8 = 0x1E;

/// System configuration register, 3-bit mode field
pub const SYSCONFIG: u8 = 0x00;
/// IR data, low byte (bit 7 is the IR overflow flag)
pub const IR_DATA_LO: u8 = 0x0A;
/// IR data, high byte
pub const IR_DATA_HI: u8 = 0x0B;
/// ALS data, low byte
pub const ALS_DATA_LO: u8 = 0x0C;
/// ALS data, high byte
pub const ALS_DATA_HI: u8 = 0x0D;
/// PS data, low byte (bit 6 is the PS overflow flag)
pub const PS_DATA_LO: u8 = 0x0E;
/// PS data, high byte
pub const PS_DATA_HI: u8 = 0x0F;
/// ALS configuration register, gain in bits 5:4
pub const ALS_CONFIG: u8 = 0x10;

/// Number of data registers read per sample (`IR_DATA_LO..=PS_DATA_HI`)
pub const DATA_LEN: usize = 6;

/// Bus transport error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum TransportError<I2cError> {
    /// I2C communication error
    I2c(I2cError),
    /// Peripheral address does not fit in 7 bits
    InvalidAddress(u8),
}

/// Source of bus handles.
///
/// The driver calls [`BusOpener::open`] once per operation and drops the
/// handle when the operation ends. Any `FnMut() -> Result<B, E>` is an opener,
/// so a closure that opens a device node gives reopen-per-call behaviour while
/// a closure returning a clone of a shared handle keeps one bus for the whole
/// program.
pub trait BusOpener {
    /// Bus handle produced by a successful open
    type Bus;
    /// Error reported when the bus cannot be opened
    type Error;

    /// Open a fresh bus handle
    fn open(&mut self) -> Result<Self::Bus, Self::Error>;
}

impl<F, B, E> BusOpener for F
where
    F: FnMut() -> Result<B, E>,
{
    type Bus = B;
    type Error = E;

    fn open(&mut self) -> Result<B, E> {
        self()
    }
}

/// An open bus handle that is not yet bound to a peripheral address
#[derive(Debug)]
pub struct Bus<I2C> {
    i2c: I2C,
}

impl<I2C: ErrorType> Bus<I2C> {
    /// Open a bus through `opener`
    pub fn open<O>(opener: &mut O) -> Result<Self, O::Error>
    where
        O: BusOpener<Bus = I2C>,
    {
        opener.open().map(|i2c| Self { i2c })
    }

    /// Associate all further transfers with a 7-bit peripheral address
    pub fn bind(self, address: u8) -> Result<BoundBus<I2C>, TransportError<I2C::Error>> {
        if address > 0x7F {
            return Err(TransportError::InvalidAddress(address));
        }
        Ok(BoundBus {
            i2c: self.i2c,
            address,
        })
    }

    /// Release the handle without binding it
    pub fn close(self) -> I2C {
        self.i2c
    }
}

/// A bus handle bound to one peripheral address
#[derive(Debug)]
pub struct BoundBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> BoundBus<I2C> {
    /// The peripheral address this handle talks to
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Release the handle. Dropping the returned bus closes it.
    pub fn close(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> BoundBus<I2C> {
    /// Write the register address, then read one byte back
    pub fn read_register(&mut self, register: u8) -> Result<u8, TransportError<I2C::Error>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buffer)
            .map_err(TransportError::I2c)?;
        Ok(buffer[0])
    }

    /// Write `value` to `register` as a single two-byte transfer
    pub fn write_register(
        &mut self,
        register: u8,
        value: u8,
    ) -> Result<(), TransportError<I2C::Error>> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(TransportError::I2c)
    }

    /// Read [`DATA_LEN`] registers one at a time in ascending order from `start`
    pub fn read_block(&mut self, start: u8) -> Result<[u8; DATA_LEN], TransportError<I2C::Error>> {
        let mut data = [0u8; DATA_LEN];
        for (offset, byte) in (0u8..).zip(data.iter_mut()) {
            *byte = self.read_register(start.wrapping_add(offset))?;
        }
        Ok(data)
    }
}

#[cfg(feature = "async")]
impl<I2C: AsyncI2c> BoundBus<I2C> {
    /// Write the register address, then read one byte back (async version)
    pub async fn read_register_async(
        &mut self,
        register: u8,
    ) -> Result<u8, TransportError<I2C::Error>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buffer)
            .await
            .map_err(TransportError::I2c)?;
        Ok(buffer[0])
    }

    /// Write `value` to `register` as a single two-byte transfer (async version)
    pub async fn write_register_async(
        &mut self,
        register: u8,
        value: u8,
    ) -> Result<(), TransportError<I2C::Error>> {
        self.i2c
            .write(self.address, &[register, value])
            .await
            .map_err(TransportError::I2c)
    }

    /// Read [`DATA_LEN`] registers one at a time from `start` (async version)
    pub async fn read_block_async(
        &mut self,
        start: u8,
    ) -> Result<[u8; DATA_LEN], TransportError<I2C::Error>> {
        let mut data = [0u8; DATA_LEN];
        for (offset, byte) in (0u8..).zip(data.iter_mut()) {
            *byte = self.read_register_async(start.wrapping_add(offset)).await?;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    extern crate std;
    use std::vec;

    fn bound(i2c: &I2cMock) -> BoundBus<I2cMock> {
        let mut opener = || Ok::<_, Infallible>(i2c.clone());
        Bus::open(&mut opener).unwrap().bind(I2C_ADDRESS).unwrap()
    }

    #[test]
    fn test_read_register_returns_byte() {
        let expectations = [I2cTransaction::write_read(
            I2C_ADDRESS,
            vec![IR_DATA_HI],
            vec![0x5A],
        )];
        let mut i2c = I2cMock::new(&expectations);

        let mut bus = bound(&i2c);
        assert_eq!(bus.read_register(IR_DATA_HI).unwrap(), 0x5A);
        bus.close();

        i2c.done();
    }

    #[test]
    fn test_write_register_is_one_transfer() {
        let expectations = [I2cTransaction::write(I2C_ADDRESS, vec![SYSCONFIG, 0b011])];
        let mut i2c = I2cMock::new(&expectations);

        let mut bus = bound(&i2c);
        bus.write_register(SYSCONFIG, 0b011).unwrap();
        bus.close();

        i2c.done();
    }

    #[test]
    fn test_read_block_ascending_order() {
        let expectations = [
            I2cTransaction::write_read(I2C_ADDRESS, vec![IR_DATA_LO], vec![1]),
            I2cTransaction::write_read(I2C_ADDRESS, vec![IR_DATA_HI], vec![2]),
            I2cTransaction::write_read(I2C_ADDRESS, vec![ALS_DATA_LO], vec![3]),
            I2cTransaction::write_read(I2C_ADDRESS, vec![ALS_DATA_HI], vec![4]),
            I2cTransaction::write_read(I2C_ADDRESS, vec![PS_DATA_LO], vec![5]),
            I2cTransaction::write_read(I2C_ADDRESS, vec![PS_DATA_HI], vec![6]),
        ];
        let mut i2c = I2cMock::new(&expectations);

        let mut bus = bound(&i2c);
        assert_eq!(bus.read_block(IR_DATA_LO).unwrap(), [1, 2, 3, 4, 5, 6]);
        bus.close();

        i2c.done();
    }

    #[test]
    fn test_read_block_stops_at_first_failure() {
        let expectations = [
            I2cTransaction::write_read(I2C_ADDRESS, vec![IR_DATA_LO], vec![1]),
            I2cTransaction::write_read(I2C_ADDRESS, vec![IR_DATA_HI], vec![0])
                .with_error(ErrorKind::Other),
        ];
        let mut i2c = I2cMock::new(&expectations);

        let mut bus = bound(&i2c);
        assert_eq!(
            bus.read_block(IR_DATA_LO),
            Err(TransportError::I2c(ErrorKind::Other))
        );
        bus.close();

        i2c.done();
    }

    #[test]
    fn test_bind_rejects_wide_address() {
        let mut i2c = I2cMock::new(&[]);
        let mut opener = || Ok::<_, Infallible>(i2c.clone());

        let bus = Bus::open(&mut opener).unwrap();
        assert!(matches!(
            bus.bind(0x80),
            Err(TransportError::InvalidAddress(0x80))
        ));

        i2c.done();
    }

    #[test]
    fn test_open_failure_is_reported() {
        let mut opener = || Err::<I2cMock, _>("no such device");
        assert_eq!(Bus::open(&mut opener).err(), Some("no such device"));
    }
}
