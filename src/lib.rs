//! Read an MCP3008 ADC wired to a Raspberry Pi's SPI header.
//!
//! The chip logic lives in the [`mcp3008`] crate and works with any `embedded-hal` SPI device.
//! Enable the `raspberry_pi` feature for [`raspberry_pi::open`], which opens `/dev/spidevB.D` through `rppal`.

pub use mcp3008::{
    normalize, Error, FixedReader, InvalidMode, Mcp3008, Mode, ParseModeError, RESOLUTION,
};

#[cfg(feature = "raspberry_pi")]
pub mod raspberry_pi;
