//! # Color Handling
//!
//! Colors move through three representations on their way to the device:
//!
//! 1. `"#RRGGBB"` strings in pattern source, parsed into [`RGB8`]
//! 2. [`Rgb12`], the 12-bit grayscale domain of the TLC5947, produced by
//!    a logarithmic 8→12-bit expansion ([`rgb8_to_rgb12`])
//! 3. The corrected output color: white balance and gamut
//!    ([`ColorCorrection`]) at color-token execution, then logarithmic
//!    brightness scaling ([`rgb12_brightness`]) whenever a pattern's
//!    brightness changes
//!
//! The value types are the `smart-leds-trait` / `rgb` ecosystem structs,
//! so colors interoperate with the rest of the Rust LED world.

mod brightness;
mod convert;
mod correction;

pub use brightness::{log_brightness, rgb12_brightness};
pub use convert::{format_hex, parse_hex6, rgb12_to_rgb8, rgb8_to_rgb12};
pub use correction::{ColorCorrection, GamutMatrix, WhiteBalance};

pub use smart_leds_trait::RGB8;

/// A color in the 12-bit-per-channel domain of the output device.
///
/// Channels are carried in `u16` with the invariant that values stay in
/// `0..=4095`; every producer in this crate (expansion, correction,
/// brightness scaling, frame read-back) preserves it.
pub type Rgb12 = smart_leds_trait::RGB<u16>;

/// All channels dark.
pub const BLACK: Rgb12 = Rgb12 { r: 0, g: 0, b: 0 };
