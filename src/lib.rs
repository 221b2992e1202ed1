//! # AP3216C Ambient Light, IR and Proximity Sensor Driver
//!
//! This is a platform-agnostic Rust driver for the AP3216C digital ambient light and
//! proximity sensor, built using the [`embedded-hal`] traits for I2C communication.
//!
//! The AP3216C provides:
//! - A 16-bit ambient light (ALS) channel with four selectable ranges
//! - A 10-bit infrared (IR) channel with an overflow flag
//! - A 10-bit proximity (PS) channel with an overflow/interference flag
//! - I2C interface (address 0x1E)
//!
//! ## Bus lifetime
//!
//! The driver does not hold a bus handle. Each operation opens one through a
//! [`BusOpener`], binds it to the configured address, performs its transfers and
//! drops it again. On Linux this means every operation reopens the `i2c-dev` node;
//! on a microcontroller the opener can simply hand out a shared bus.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ap3216c::Ap3216c;
//! use core::convert::Infallible;
//!
//! # fn main() {
//! # let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
//! # let delay = embedded_hal_mock::eh1::delay::NoopDelay::new();
//! let opener = move || Ok::<_, Infallible>(i2c.clone());
//! let mut sensor = Ap3216c::new(opener, delay);
//!
//! // Software reset, then enable ALS and PS+IR
//! sensor.initialize().unwrap();
//!
//! let sample = sensor.read_sample().unwrap();
//! // println!("ir: {} als: {} ps: {}", sample.ir, sample.als, sample.ps);
//! # let _ = sample;
//! # }
//! ```
//!
//! ## Async Usage
//!
//! Enable the `async` feature to use async/await patterns:
//!
//! ```toml
//! [dependencies]
//! ap3216c = { version = "0.1", features = ["async"] }
//! ```
//!
//! ```rust,ignore
//! let mut sensor = Ap3216c::new(opener, delay);
//! sensor.initialize_async().await.unwrap();
//! let sample = sensor.read_sample_async().await.unwrap();
//! ```
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal

#![no_std]
#![deny(missing_docs)]

use core::fmt;

use embedded_hal::i2c::{ErrorType, I2c};

#[cfg(feature = "async")]
use embedded_hal_async::i2c::I2c as AsyncI2c;

pub mod ll;

pub use ll::{BusOpener, TransportError, I2C_ADDRESS};

use ll::{BoundBus, Bus, ALS_CONFIG, DATA_LEN, IR_DATA_LO, SYSCONFIG};

const IR_OVERFLOW: u8 = 0x80;
const PS_OVERFLOW: u8 = 0x40;
const ALS_GAIN_MASK: u8 = 0x30;

/// System operating mode, written to the 3-bit field of the configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Mode {
    /// Power down (default after power-up)
    PowerDown = 0b000,
    /// ALS function active
    Als = 0b001,
    /// PS+IR function active
    PsIr = 0b010,
    /// ALS and PS+IR functions active
    AlsPsIr = 0b011,
    /// Software reset
    Reset = 0b100,
    /// ALS function once
    AlsOnce = 0b101,
    /// PS+IR function once
    PsIrOnce = 0b110,
    /// ALS and PS+IR functions once
    AlsPsIrOnce = 0b111,
}

/// ALS dynamic range, selected by the gain bits of the ALS configuration register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum AlsRange {
    /// 0 - 20661 lux (default)
    Lux20661 = 0b00,
    /// 0 - 5162 lux
    Lux5162 = 0b01,
    /// 0 - 1291 lux
    Lux1291 = 0b10,
    /// 0 - 323 lux
    Lux323 = 0b11,
}

impl AlsRange {
    /// Decode the two gain bits (already shifted down)
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => AlsRange::Lux20661,
            0b01 => AlsRange::Lux5162,
            0b10 => AlsRange::Lux1291,
            _ => AlsRange::Lux323,
        }
    }

    /// Lux represented by one ALS count in this range
    pub fn lux_per_count(self) -> f32 {
        match self {
            AlsRange::Lux20661 => 0.36,
            AlsRange::Lux5162 => 0.089,
            AlsRange::Lux1291 => 0.022,
            AlsRange::Lux323 => 0.0056,
        }
    }
}

/// One decoded measurement of the three channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Sample {
    /// IR reading (0-1023), 0 when the overflow flag was set
    pub ir: u16,
    /// Ambient light reading (0-65535)
    pub als: u16,
    /// Proximity reading (0-1023), 0 when the overflow flag was set
    pub ps: u16,
}

impl Sample {
    /// Decode the six data registers starting at `IR_DATA_LO`
    pub fn from_registers(raw: &[u8; DATA_LEN]) -> Self {
        let ir = if raw[0] & IR_OVERFLOW != 0 {
            0
        } else {
            (u16::from(raw[1]) << 2) | u16::from(raw[0] & 0x03)
        };

        let als = u16::from_le_bytes([raw[2], raw[3]]);

        let ps = if raw[4] & PS_OVERFLOW != 0 {
            0
        } else {
            (u16::from(raw[5] & 0x3F) << 4) | u16::from(raw[4] & 0x0F)
        };

        Self { ir, als, ps }
    }

    /// Convert the ALS reading to lux for the given range
    pub fn lux(&self, range: AlsRange) -> f32 {
        f32::from(self.als) * range.lux_per_count()
    }
}

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Config {
    /// 7-bit peripheral address
    pub address: u8,
    /// Time to wait after the software reset before enabling the sensor
    pub reset_delay_ms: u32,
}

impl Config {
    /// Factory defaults: address 0x1E, 50 ms reset delay
    pub const fn new() -> Self {
        Self {
            address: I2C_ADDRESS,
            reset_delay_ms: 50,
        }
    }

    /// Use a different peripheral address
    pub const fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Use a different post-reset delay
    pub const fn with_reset_delay_ms(mut self, reset_delay_ms: u32) -> Self {
        self.reset_delay_ms = reset_delay_ms;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// All possible errors in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error<O, E> {
    /// The bus could not be opened
    Open(O),
    /// I2C communication error
    I2c(E),
    /// Configured address does not fit in 7 bits
    InvalidAddress(u8),
}

impl<O, E> From<TransportError<E>> for Error<O, E> {
    fn from(err: TransportError<E>) -> Self {
        match err {
            TransportError::I2c(e) => Error::I2c(e),
            TransportError::InvalidAddress(address) => Error::InvalidAddress(address),
        }
    }
}

impl<O: fmt::Debug, E: fmt::Debug> fmt::Display for Error<O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Open(e) => write!(f, "cannot open bus: {e:?}"),
            Error::I2c(e) => write!(f, "bus transfer failed: {e:?}"),
            Error::InvalidAddress(address) => {
                write!(f, "address {address:#04x} is not a 7-bit address")
            }
        }
    }
}

/// High-level AP3216C driver
pub struct Ap3216c<O, Delay> {
    opener: O,
    delay: Delay,
    config: Config,
}

impl<O, Delay> Ap3216c<O, Delay> {
    /// Create a new AP3216C driver with the default configuration
    pub fn new(opener: O, delay: Delay) -> Self {
        Self::with_config(opener, delay, Config::new())
    }

    /// Create a new AP3216C driver with an explicit configuration
    pub fn with_config(opener: O, delay: Delay, config: Config) -> Self {
        Self {
            opener,
            delay,
            config,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Destroy the driver and return the opener and delay
    pub fn destroy(self) -> (O, Delay) {
        (self.opener, self.delay)
    }
}

impl<O, I2C, Delay> Ap3216c<O, Delay>
where
    O: BusOpener<Bus = I2C>,
    I2C: ErrorType,
{
    // Open a fresh bus and bind it to the configured address
    fn session(&mut self) -> Result<BoundBus<I2C>, Error<O::Error, I2C::Error>> {
        let bus = Bus::open(&mut self.opener).map_err(Error::Open)?;
        Ok(bus.bind(self.config.address)?)
    }
}

impl<O, I2C, Delay> Ap3216c<O, Delay>
where
    O: BusOpener<Bus = I2C>,
    I2C: I2c,
{
    /// Software reset, wait for the reset delay, then enable ALS and PS+IR.
    ///
    /// All three steps share one bus session.
    pub fn initialize(&mut self) -> Result<(), Error<O::Error, I2C::Error>>
    where
        Delay: embedded_hal::delay::DelayNs,
    {
        let mut bus = self.session()?;
        bus.write_register(SYSCONFIG, Mode::Reset as u8)?;
        self.delay.delay_ms(self.config.reset_delay_ms);
        bus.write_register(SYSCONFIG, Mode::AlsPsIr as u8)?;
        bus.close();
        Ok(())
    }

    /// Write the system operating mode
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), Error<O::Error, I2C::Error>> {
        let mut bus = self.session()?;
        bus.write_register(SYSCONFIG, mode as u8)?;
        bus.close();
        Ok(())
    }

    /// Read the six raw data registers, IR low byte first
    pub fn read_raw(&mut self) -> Result<[u8; DATA_LEN], Error<O::Error, I2C::Error>> {
        let mut bus = self.session()?;
        let raw = bus.read_block(IR_DATA_LO)?;
        bus.close();
        Ok(raw)
    }

    /// Read and decode one sample of all three channels
    pub fn read_sample(&mut self) -> Result<Sample, Error<O::Error, I2C::Error>> {
        let raw = self.read_raw()?;
        Ok(Sample::from_registers(&raw))
    }

    /// Select the ALS range, keeping the persistence bits
    pub fn set_als_range(&mut self, range: AlsRange) -> Result<(), Error<O::Error, I2C::Error>> {
        let mut bus = self.session()?;
        let current = bus.read_register(ALS_CONFIG)?;
        let updated = (current & !ALS_GAIN_MASK) | ((range as u8) << 4);
        bus.write_register(ALS_CONFIG, updated)?;
        bus.close();
        Ok(())
    }

    /// Read back the selected ALS range
    pub fn als_range(&mut self) -> Result<AlsRange, Error<O::Error, I2C::Error>> {
        let mut bus = self.session()?;
        let current = bus.read_register(ALS_CONFIG)?;
        bus.close();
        Ok(AlsRange::from_bits(current >> 4))
    }
}

#[cfg(feature = "async")]
impl<O, I2C, Delay> Ap3216c<O, Delay>
where
    O: BusOpener<Bus = I2C>,
    I2C: AsyncI2c,
{
    /// Software reset, wait for the reset delay, then enable ALS and PS+IR (async version)
    pub async fn initialize_async(&mut self) -> Result<(), Error<O::Error, I2C::Error>>
    where
        Delay: embedded_hal_async::delay::DelayNs,
    {
        let mut bus = self.session()?;
        bus.write_register_async(SYSCONFIG, Mode::Reset as u8).await?;
        self.delay.delay_ms(self.config.reset_delay_ms).await;
        bus.write_register_async(SYSCONFIG, Mode::AlsPsIr as u8).await?;
        bus.close();
        Ok(())
    }

    /// Write the system operating mode (async version)
    pub async fn set_mode_async(&mut self, mode: Mode) -> Result<(), Error<O::Error, I2C::Error>> {
        let mut bus = self.session()?;
        bus.write_register_async(SYSCONFIG, mode as u8).await?;
        bus.close();
        Ok(())
    }

    /// Read the six raw data registers, IR low byte first (async version)
    pub async fn read_raw_async(&mut self) -> Result<[u8; DATA_LEN], Error<O::Error, I2C::Error>> {
        let mut bus = self.session()?;
        let raw = bus.read_block_async(IR_DATA_LO).await?;
        bus.close();
        Ok(raw)
    }

    /// Read and decode one sample of all three channels (async version)
    pub async fn read_sample_async(&mut self) -> Result<Sample, Error<O::Error, I2C::Error>> {
        let raw = self.read_raw_async().await?;
        Ok(Sample::from_registers(&raw))
    }

    /// Select the ALS range, keeping the persistence bits (async version)
    pub async fn set_als_range_async(
        &mut self,
        range: AlsRange,
    ) -> Result<(), Error<O::Error, I2C::Error>> {
        let mut bus = self.session()?;
        let current = bus.read_register_async(ALS_CONFIG).await?;
        let updated = (current & !ALS_GAIN_MASK) | ((range as u8) << 4);
        bus.write_register_async(ALS_CONFIG, updated).await?;
        bus.close();
        Ok(())
    }

    /// Read back the selected ALS range (async version)
    pub async fn als_range_async(&mut self) -> Result<AlsRange, Error<O::Error, I2C::Error>> {
        let mut bus = self.session()?;
        let current = bus.read_register_async(ALS_CONFIG).await?;
        bus.close();
        Ok(AlsRange::from_bits(current >> 4))
    }
}
