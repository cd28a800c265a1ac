//! # Strobe Driver
//!
//! The boundary between the controller and the hardware. The TLC5947 is
//! fed over plain SPI (data + clock into the shift register) plus two
//! GPIO lines:
//!
//! - **XLAT**: a rising edge latches the shifted bits into the grayscale
//!   register
//! - **BLANK**: high forces all outputs off
//!
//! [`FrameWriter`] is the trait the controller drives; [`Tlc5947Spi`]
//! implements it on top of any [`embedded_hal`] SPI bus and output pins.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::frame::FRAME_LEN;

/// Sink for completed grayscale frames.
///
/// The controller calls [`latch`](FrameWriter::latch) at most once per
/// tick, and only on ticks where some lamp changed.
pub trait FrameWriter {
    /// The error type of the underlying transport.
    type Error;

    /// Shifts a full frame into the cascade and latches it.
    fn latch(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), Self::Error>;

    /// Drives the BLANK line; `true` forces all outputs off.
    fn blank(&mut self, on: bool) -> Result<(), Self::Error>;
}

/// Error of [`Tlc5947Spi`], separating bus from pin failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError<Spi, Pin> {
    /// The SPI transfer failed.
    Spi(Spi),
    /// A strobe pin refused to switch.
    Pin(Pin),
}

/// [`FrameWriter`] over a hardware SPI bus and two strobe pins.
///
/// # Type Parameters
///
/// * `Spi` - The SPI bus type
/// * `Xlat` - The latch pin type
/// * `Blank` - The blanking pin type
#[derive(Debug)]
pub struct Tlc5947Spi<Spi, Xlat, Blank> {
    spi: Spi,
    xlat: Xlat,
    blank: Blank,
}

impl<Spi, Xlat, Blank> Tlc5947Spi<Spi, Xlat, Blank> {
    /// Wraps the SPI bus and strobe pins into a driver.
    ///
    /// The SPI bus must be configured for MSB-first transfers; clock rate
    /// is limited only by the device (30 MHz grade parts are common).
    pub fn new(spi: Spi, xlat: Xlat, blank: Blank) -> Self {
        Tlc5947Spi { spi, xlat, blank }
    }

    /// Releases the bus and pins.
    pub fn release(self) -> (Spi, Xlat, Blank) {
        (self.spi, self.xlat, self.blank)
    }
}

impl<Spi, Xlat, Blank> FrameWriter for Tlc5947Spi<Spi, Xlat, Blank>
where
    Spi: SpiBus<u8>,
    Xlat: OutputPin,
    Blank: OutputPin<Error = Xlat::Error>,
{
    type Error = DriverError<Spi::Error, Xlat::Error>;

    /// XLAT low, shift 36 bytes MSB first, XLAT high. The rising edge
    /// moves the shift register into the grayscale register.
    fn latch(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), Self::Error> {
        self.xlat.set_low().map_err(DriverError::Pin)?;
        self.spi.write(frame).map_err(DriverError::Spi)?;
        self.spi.flush().map_err(DriverError::Spi)?;
        self.xlat.set_high().map_err(DriverError::Pin)
    }

    fn blank(&mut self, on: bool) -> Result<(), Self::Error> {
        if on {
            self.blank.set_high().map_err(DriverError::Pin)
        } else {
            self.blank.set_low().map_err(DriverError::Pin)
        }
    }
}
