//! Provides a driver for a Microchip MCP3008 ADC via the `embedded-hal` ecosystem.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

use embedded_hal::spi::SpiDevice;

mod mode;
mod reader;

pub use mode::{InvalidMode, Mode, ParseModeError};
pub use reader::{FixedReader, Mcp3008};

/// Number of distinct values a conversion can produce (10 bits).
pub const RESOLUTION: u16 = 1 << 10;

/// Errors reported by the MCP3008 driver.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error<E> {
    /// Mode code outside `0..=15`. No transfer was issued.
    #[error("mode code {0} is outside 0..=15")]
    InvalidMode(u8),
    /// The reader was closed before the read was attempted.
    #[error("the SPI device has already been closed")]
    Closed,
    /// The underlying SPI transfer failed.
    #[error("SPI transfer failed: {0:?}")]
    Transfer(E),
}

impl<E> From<InvalidMode> for Error<E> {
    fn from(InvalidMode(code): InvalidMode) -> Self {
        Error::InvalidMode(code)
    }
}

/// Scale a raw reading into `[0, reference)`.
pub fn normalize(raw: u16, reference: f64) -> f64 {
    reference * f64::from(raw) / f64::from(RESOLUTION)
}

/// Bytes clocked out for a conversion in `mode`: start bit, configuration, listen space.
pub(crate) fn request(mode: Mode) -> [u8; 3] {
    [0b0000_0001, (mode as u8) << 4, 0b0000_0000]
}

/// First byte is don't-care, B9 and B8 sit in the low bits of the second, B7 - B0 fill the third.
pub(crate) fn decode(response: [u8; 3]) -> u16 {
    (u16::from(response[1] % 4) << 8) + u16::from(response[2])
}

/// Internal method for a single full-duplex exchange with the chip.
pub(crate) fn read_mode<SPI: SpiDevice>(spi: &mut SPI, mode: Mode) -> Result<u16, SPI::Error> {
    let mut buffer = request(mode);

    log::trace!("mcp3008 {mode} request {buffer:02x?}");

    spi.transfer_in_place(&mut buffer)?;

    log::trace!("mcp3008 {mode} response {buffer:02x?}");

    Ok(decode(buffer))
}
