//! Print MCP3008 readings from a Raspberry Pi SPI device.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use embedded_hal::spi::SpiDevice;
use rpi_mcp3008::raspberry_pi::{self, Error};
use rpi_mcp3008::{Mcp3008, Mode};
use tracing_subscriber::EnvFilter;

/// Read the channels of an MCP3008 attached to /dev/spidevBUS.DEVICE
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SPI bus index
    #[arg(short, long, default_value_t = 0)]
    bus: u8,

    /// Chip select index on the bus
    #[arg(short, long, default_value_t = 0)]
    device: u8,

    /// Scale readings to this reference voltage (usually V_REF)
    #[arg(short, long)]
    reference: Option<f64>,

    /// Comma separated modes (CH0 - CH7, DF0 - DF7 or codes 0 - 15). Reads all 16 when omitted
    #[arg(short, long, value_delimiter = ',')]
    modes: Vec<Mode>,

    /// Drive this BCM GPIO pin as chip select instead of the kernel's CE line
    #[arg(long)]
    chip_select: Option<u8>,

    /// Keep reading every INTERVAL milliseconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Stop after COUNT rounds when reading on an interval
    #[arg(short, long)]
    count: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let context = || format!("opening /dev/spidev{}.{}", args.bus, args.device);

    match args.chip_select {
        Some(pin) => {
            let mcp = raspberry_pi::open_with_chip_select(args.bus, args.device, pin)
                .with_context(context)?;
            run(mcp, &args)
        }
        None => {
            let mcp = raspberry_pi::open(args.bus, args.device).with_context(context)?;
            run(mcp, &args)
        }
    }
}

fn run<SPI: SpiDevice + std::fmt::Debug>(mut mcp: Mcp3008<SPI>, args: &Args) -> Result<()> {
    let mut round = 0;

    loop {
        let line = read_line(&mut mcp, &args.modes, args.reference)
            .with_context(|| format!("reading {mcp:?}"))?;

        println!("{line}");

        round += 1;

        let Some(interval) = args.interval else {
            break;
        };

        if args.count.is_some_and(|count| round >= count) {
            break;
        }

        std::thread::sleep(Duration::from_millis(interval));
    }

    mcp.close();

    Ok(())
}

/// One round of readings as `MODE=value` pairs. All 16 modes when `modes` is empty.
fn read_line<SPI: SpiDevice>(
    mcp: &mut Mcp3008<SPI>,
    modes: &[Mode],
    reference: Option<f64>,
) -> Result<String, Error> {
    let all = modes.is_empty();
    let modes = if all { &Mode::ALL[..] } else { modes };

    let fields: Vec<String> = match reference {
        Some(reference) => {
            let volts = if all {
                mcp.read_all_normalized(reference)?.to_vec()
            } else {
                let mut volts = vec![0.0; modes.len()];
                mcp.read_modes_normalized_into(modes, reference, &mut volts)?;
                volts
            };

            modes
                .iter()
                .zip(volts)
                .map(|(mode, volts)| format!("{mode}={volts:.4}"))
                .collect()
        }
        None => {
            let raw = if all {
                mcp.read_all()?.to_vec()
            } else {
                let mut raw = vec![0; modes.len()];
                mcp.read_modes_into(modes, &mut raw)?;
                raw
            };

            modes
                .iter()
                .zip(raw)
                .map(|(mode, raw)| format!("{mode}={raw}"))
                .collect()
        }
    };

    Ok(fields.join(" "))
}
