#![no_std]

//! # tlc5947-rgb
//!
//! A no-std, no-alloc driver for cascades of TI TLC5947 constant-current
//! 12-bit PWM LED sinks — 24 channels, wired as 8 RGB lamps per device —
//! with a compact animation language, so programs describe what a lamp
//! does instead of writing colors every tick.
//!
//! ## How it works
//!
//! - Write animations in the [`pattern`] language: tiny programs of
//!   colors, sleeps, brightness ramps, and loops
//! - Install them on lamps through the [`control::Controller`]; patterns
//!   stack per lamp and composite with transparency
//! - A periodic timer calls [`tick`](control::Controller::tick): every
//!   pattern advances one step, changed lamps are recomposited, and the
//!   36-byte frame is latched out over SPI by the [`driver`]
//!
//! ## Features
//!
//! - **No-std, no-alloc**: fixed capacities via `heapless`, designed for
//!   embedded targets
//! - **Interrupt-friendly**: `tick` never blocks; it skips a frame when a
//!   mutator holds the lock
//! - **Layered patterns**: stack animations per lamp, with transparency
//!   and background colors
//! - **Calibrated color**: logarithmic 8→12-bit expansion, white balance,
//!   gamut correction, perceptual brightness
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tlc5947_rgb::{control::Controller, driver::Tlc5947Spi};
//!
//! let mut leds = Controller::new(Tlc5947Spi::new(spi, xlat_pin, blank_pin));
//!
//! // Blue background; blink white on top every 500 ticks.
//! leds.set(&[0], "#0000FF")?;
//! let blinker = leds.set(&[0], "+[#FFFFFF|500#000000|500]")?;
//!
//! // From the periodic timer or its interrupt handler:
//! leds.tick()?;
//!
//! // The background shows again once the blinker is gone.
//! leds.delete(blinker);
//! ```
//!
//! See the [`pattern`] module for the full language.

pub mod color;
pub mod control;
pub mod driver;
pub mod error;
pub mod frame;
pub mod pattern;

pub use self::control::Controller;
pub use self::driver::{FrameWriter, Tlc5947Spi};
pub use self::error::{Error, ParseError};
