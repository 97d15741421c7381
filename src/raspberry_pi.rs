use std::fmt;

use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode as SpiMode, SimpleHalSpiDevice, SlaveSelect, Spi};

use crate::{FixedReader, Mcp3008, Mode};

/// SPI clock used for the MCP3008. Well under the 1.35 MHz limit at 2.7 V.
pub const CLOCK_SPEED: u32 = 1_000_000;

/// SPI device using the kernel-driven chip select line.
pub type PiSpi = SpiNode<SimpleHalSpiDevice<Spi>>;

/// SPI device using a GPIO pin as chip select.
pub type PiSpiWithChipSelect = SpiNode<ExclusiveDevice<Spi, OutputPin, NoDelay>>;

/// An SPI device that remembers which `/dev/spidev{bus}.{device}` node it was opened from.
pub struct SpiNode<D> {
    inner: D,
    bus: u8,
    device: u8,
}

impl<D> SpiNode<D> {
    pub(crate) fn new(inner: D, bus: u8, device: u8) -> Self {
        Self { inner, bus, device }
    }
}

impl<D> fmt::Display for SpiNode<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/dev/spidev{}.{}", self.bus, self.device)
    }
}

impl<D> fmt::Debug for SpiNode<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SpiNode")
            .field(&format_args!("{self}"))
            .finish()
    }
}

impl<D: ErrorType> ErrorType for SpiNode<D> {
    type Error = D::Error;
}

impl<D: SpiDevice> SpiDevice for SpiNode<D> {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.inner.transaction(operations)
    }
}

/// Errors from opening or reading an MCP3008 on the Pi.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open /dev/spidev{bus}.{device}")]
    DeviceOpen {
        bus: u8,
        device: u8,
        #[source]
        source: rppal::spi::Error,
    },
    #[error("/dev/spidev{bus}.{device} does not name an SPI bus and chip select")]
    NoSuchDevice { bus: u8, device: u8 },
    #[error("failed to claim the chip select pin")]
    Gpio(#[from] rppal::gpio::Error),
    #[error("mode code {0} is outside 0..=15")]
    InvalidMode(u8),
    #[error("the SPI device has already been closed")]
    Closed,
    #[error("SPI transfer failed: {0}")]
    Transfer(ErrorKind),
}

impl<E: embedded_hal::spi::Error> From<mcp3008::Error<E>> for Error {
    fn from(error: mcp3008::Error<E>) -> Self {
        match error {
            mcp3008::Error::InvalidMode(code) => Error::InvalidMode(code),
            mcp3008::Error::Closed => Error::Closed,
            mcp3008::Error::Transfer(error) => Error::Transfer(error.kind()),
        }
    }
}

/// Opens `/dev/spidev{bus}.{device}` in SPI mode 0.
pub fn open(bus: u8, device: u8) -> Result<Mcp3008<PiSpi>, Error> {
    let spi = open_bus(bus, device)?;

    Ok(Mcp3008::new(SpiNode::new(
        SimpleHalSpiDevice::new(spi),
        bus,
        device,
    )))
}

/// Opens `/dev/spidev{bus}.{device}` and drives BCM GPIO `pin` as chip select.
pub fn open_with_chip_select(
    bus: u8,
    device: u8,
    pin: u8,
) -> Result<Mcp3008<PiSpiWithChipSelect>, Error> {
    let spi = open_bus(bus, device)?;

    let chip_select = Gpio::new()?.get(pin)?.into_output_high();

    tracing::debug!(pin, "using GPIO chip select");

    Ok(Mcp3008::new(SpiNode::new(
        ExclusiveDevice::new_no_delay(spi, chip_select),
        bus,
        device,
    )))
}

/// Opens a reader that always reads `modes`.
pub fn fixed<const N: usize>(
    modes: [Mode; N],
    bus: u8,
    device: u8,
) -> Result<FixedReader<PiSpi, N>, Error> {
    open(bus, device).map(|adc| adc.fixed(modes))
}

fn open_bus(bus: u8, device: u8) -> Result<Spi, Error> {
    let (Some(spi_bus), Some(slave_select)) = (to_bus(bus), to_slave_select(device)) else {
        return Err(Error::NoSuchDevice { bus, device });
    };

    let spi = Spi::new(spi_bus, slave_select, CLOCK_SPEED, SpiMode::Mode0)
        .map_err(|source| Error::DeviceOpen {
            bus,
            device,
            source,
        })?;

    tracing::debug!(bus, device, "opened SPI device");

    Ok(spi)
}

fn to_bus(index: u8) -> Option<Bus> {
    Some(match index {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        2 => Bus::Spi2,
        3 => Bus::Spi3,
        4 => Bus::Spi4,
        5 => Bus::Spi5,
        6 => Bus::Spi6,
        _ => return None,
    })
}

fn to_slave_select(index: u8) -> Option<SlaveSelect> {
    Some(match index {
        0 => SlaveSelect::Ss0,
        1 => SlaveSelect::Ss1,
        2 => SlaveSelect::Ss2,
        3 => SlaveSelect::Ss3,
        4 => SlaveSelect::Ss4,
        5 => SlaveSelect::Ss5,
        6 => SlaveSelect::Ss6,
        7 => SlaveSelect::Ss7,
        8 => SlaveSelect::Ss8,
        9 => SlaveSelect::Ss9,
        10 => SlaveSelect::Ss10,
        11 => SlaveSelect::Ss11,
        12 => SlaveSelect::Ss12,
        13 => SlaveSelect::Ss13,
        14 => SlaveSelect::Ss14,
        15 => SlaveSelect::Ss15,
        _ => return None,
    })
}
