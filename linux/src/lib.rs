//! Sampling loop and command line for the AP3216C on Linux.
//!
//! The loop itself only needs the `embedded-hal` traits, so it runs equally
//! against an `i2c-dev` node or a mocked bus.

use std::ffi::OsString;
use std::fmt::Debug;
use std::io::{self, Write};
use std::path::PathBuf;

use ap3216c::{Ap3216c, BusOpener, Sample, I2C_ADDRESS};
use clap::Parser;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, warn};

/// Bus device node used when `--device` is not given
pub const DEFAULT_BUS: &str = "/dev/i2c-1";

/// Pause after every sample
pub const SAMPLE_INTERVAL_MS: u32 = 150;

/// Command line options
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "ap3216c",
    version,
    about = "Read ambient light, IR and proximity values from an AP3216C"
)]
pub struct Args {
    /// Number of samples to take
    #[arg(short = 'c', long, value_name = "COUNT", default_value_t = 0)]
    pub count: u32,

    /// I2C bus device node
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_BUS)]
    pub device: PathBuf,

    /// Sensor address, decimal or 0x-prefixed hex
    #[arg(
        short,
        long,
        value_name = "ADDR",
        default_value = "0x1e",
        value_parser = parse_address
    )]
    pub address: u8,
}

fn parse_address(text: &str) -> Result<u8, String> {
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse(),
    };
    let address = parsed.map_err(|e| format!("invalid address `{text}`: {e}"))?;
    if address > 0x7F {
        return Err(format!("address {address:#04x} does not fit in 7 bits"));
    }
    Ok(address)
}

impl Default for Args {
    fn default() -> Self {
        Self {
            count: 0,
            device: PathBuf::from(DEFAULT_BUS),
            address: I2C_ADDRESS,
        }
    }
}

/// Help, version or usage-error text together with the exit code it implies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    /// 0 for help and version, 1 for usage errors
    pub code: i32,
    /// Rendered clap output
    pub text: String,
}

/// Parse `argv` (program name first)
pub fn parse_args<I, T>(argv: I) -> Result<Args, Usage>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Args::try_parse_from(argv).map_err(|err| Usage {
        code: if err.use_stderr() { 1 } else { 0 },
        text: err.render().to_string(),
    })
}

/// One stdout line for a decoded sample
pub fn format_sample(index: u32, sample: &Sample) -> String {
    format!(
        "{index} ap3216 ir: {} als: {} ps: {}",
        sample.ir, sample.als, sample.ps
    )
}

/// Initialize the sensor and print the result line
pub fn report_init<O, I2C, D, W>(sensor: &mut Ap3216c<O, D>, out: &mut W) -> io::Result<()>
where
    O: BusOpener<Bus = I2C>,
    O::Error: Debug,
    I2C: I2c,
    D: DelayNs,
    W: Write,
{
    match sensor.initialize() {
        Ok(()) => writeln!(out, "ap3216 init success."),
        Err(err) => {
            warn!("initialization failed: {err}");
            writeln!(out, "ap3216 init failed.")
        }
    }
}

/// Take `count` samples, sleeping [`SAMPLE_INTERVAL_MS`] after each.
///
/// Sensor failures are reported on `out` and never stop the loop; only a
/// failed write to `out` is returned as an error.
pub fn sample_loop<O, I2C, D, S, W>(
    sensor: &mut Ap3216c<O, D>,
    sleep: &mut S,
    count: u32,
    out: &mut W,
) -> io::Result<()>
where
    O: BusOpener<Bus = I2C>,
    O::Error: Debug,
    I2C: I2c,
    S: DelayNs,
    W: Write,
{
    for index in 0..count {
        match sensor.read_sample() {
            Ok(sample) => {
                debug!("sample {index}: {sample:?}");
                writeln!(out, "{}", format_sample(index, &sample))?;
            }
            Err(err) => {
                warn!("sample {index} failed: {err}");
                writeln!(out, "ap3216 read failed")?;
            }
        }
        sleep.delay_ms(SAMPLE_INTERVAL_MS);
    }
    Ok(())
}

/// Initialize the sensor, then take `count` samples
pub fn run<O, I2C, D, S, W>(
    sensor: &mut Ap3216c<O, D>,
    sleep: &mut S,
    count: u32,
    out: &mut W,
) -> io::Result<()>
where
    O: BusOpener<Bus = I2C>,
    O::Error: Debug,
    I2C: I2c,
    D: DelayNs,
    S: DelayNs,
    W: Write,
{
    report_init(sensor, out)?;
    sample_loop(sensor, sleep, count, out)
}

/// Whole program: initialize, report, then act on the command line.
///
/// The sensor is initialized before the options are acted on, so help and
/// usage errors still print the init line. When `argv` does not parse, the
/// sensor is built from the default options. Help and version text go to
/// `out`, usage errors to `err`. Returns the process exit code.
pub fn run_cli<A, T, F, O, I2C, D, S, W, E>(
    argv: A,
    make_sensor: F,
    sleep: &mut S,
    out: &mut W,
    err: &mut E,
) -> io::Result<i32>
where
    A: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    F: FnOnce(&Args) -> Ap3216c<O, D>,
    O: BusOpener<Bus = I2C>,
    O::Error: Debug,
    I2C: I2c,
    D: DelayNs,
    S: DelayNs,
    W: Write,
    E: Write,
{
    let parsed = parse_args(argv);
    let mut sensor = match &parsed {
        Ok(args) => make_sensor(args),
        Err(_) => make_sensor(&Args::default()),
    };

    report_init(&mut sensor, out)?;

    match parsed {
        Ok(args) => {
            sample_loop(&mut sensor, sleep, args.count, out)?;
            Ok(0)
        }
        Err(usage) if usage.code == 0 => {
            write!(out, "{}", usage.text)?;
            Ok(0)
        }
        Err(usage) => {
            write!(err, "{}", usage.text)?;
            Ok(usage.code)
        }
    }
}

/// Opener that opens `path` afresh for every driver operation
#[cfg(target_os = "linux")]
pub fn device_opener(
    path: PathBuf,
) -> impl BusOpener<Bus = linux_embedded_hal::I2cdev, Error = impl Debug> {
    move || {
        debug!("opening {}", path.display());
        linux_embedded_hal::I2cdev::new(&path)
    }
}
