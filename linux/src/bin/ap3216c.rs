//! AP3216C sampler
//!
//! Initializes the sensor, then prints `-c <count>` samples of the IR, ALS
//! and PS channels, 150 ms apart.
//!
//! ```bash
//! RUST_LOG=debug ap3216c -c 10
//! ```

#[cfg(target_os = "linux")]
use std::io::Write;

#[cfg(target_os = "linux")]
use anyhow::Context;
#[cfg(target_os = "linux")]
use ap3216c::{Ap3216c, Config};
#[cfg(target_os = "linux")]
use ap3216c_linux::{device_opener, run_cli, Args};
#[cfg(target_os = "linux")]
use linux_embedded_hal::Delay;

#[cfg(target_os = "linux")]
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let stderr = std::io::stderr();
    let mut err = stderr.lock();

    let code = run_cli(
        std::env::args_os(),
        |args: &Args| {
            log::info!(
                "sensor {:#04x} on {}, {} sample(s)",
                args.address,
                args.device.display(),
                args.count
            );
            let config = Config::new().with_address(args.address);
            Ap3216c::with_config(device_opener(args.device.clone()), Delay, config)
        },
        &mut Delay,
        &mut out,
        &mut err,
    )
    .context("writing to stdout")?;

    out.flush().context("flushing stdout")?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn main() {
    println!("This tool requires Linux with i2c-dev support.");
}
