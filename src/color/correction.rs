//! White balance and gamut correction for LED hardware.
//!
//! Real RGB lamps are not balanced: equal 12-bit values on the three
//! channels rarely produce a neutral white, and the primaries bleed into
//! one another. Two corrections compensate:
//!
//! - [`WhiteBalance`]: a per-channel attenuation that normalizes the
//!   perceived white point
//! - [`GamutMatrix`]: a 3×3 linear transform that corrects primary
//!   cross-talk
//!
//! Both are applied when a pattern executes a color token, never per tick,
//! so their cost is paid once per color change.

use crate::color::Rgb12;

/// Per-channel white point attenuation.
///
/// Each factor is in [0, 1]; attenuation only, since a 12-bit channel has
/// no headroom to amplify into.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WhiteBalance {
    /// Scaling factor for the red channel.
    pub red: f32,
    /// Scaling factor for the green channel.
    pub green: f32,
    /// Scaling factor for the blue channel.
    pub blue: f32,
}

impl WhiteBalance {
    /// Creates a white balance, clamping each factor to [0, 1].
    pub fn new(red: f32, green: f32, blue: f32) -> Self {
        WhiteBalance {
            red: red.clamp(0.0, 1.0),
            green: green.clamp(0.0, 1.0),
            blue: blue.clamp(0.0, 1.0),
        }
    }

    /// Attenuates each channel, truncating.
    pub fn apply(&self, c: Rgb12) -> Rgb12 {
        Rgb12 {
            r: (c.r as f32 * self.red) as u16,
            g: (c.g as f32 * self.green) as u16,
            b: (c.b as f32 * self.blue) as u16,
        }
    }
}

impl Default for WhiteBalance {
    fn default() -> Self {
        WhiteBalance {
            red: 1.0,
            green: 1.0,
            blue: 1.0,
        }
    }
}

/// 3×3 gamut correction matrix, row-major, output channel per row.
///
/// Entries are in [0, 1] and every row must sum to at most 1.0; the
/// no-amplification invariant keeps the matrix-vector product inside the
/// 12-bit channel domain.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GamutMatrix(pub [[f32; 3]; 3]);

impl GamutMatrix {
    /// The identity matrix: no cross-talk correction.
    pub const fn identity() -> Self {
        GamutMatrix([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Checks the no-amplification invariant: each row sums to ≤ 1.0.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|row| row[0] + row[1] + row[2] <= 1.0)
    }

    /// Matrix-vector product over the channels, truncating.
    pub fn apply(&self, c: Rgb12) -> Rgb12 {
        let (r, g, b) = (c.r as f32, c.g as f32, c.b as f32);
        let m = &self.0;
        Rgb12 {
            r: (r * m[0][0] + g * m[0][1] + b * m[0][2]) as u16,
            g: (r * m[1][0] + g * m[1][1] + b * m[1][2]) as u16,
            b: (r * m[2][0] + g * m[2][1] + b * m[2][2]) as u16,
        }
    }
}

impl Default for GamutMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// The full color correction applied to a freshly-executed color token:
/// white balance first, then gamut.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ColorCorrection {
    /// White point attenuation.
    pub white_balance: WhiteBalance,
    /// Cross-talk correction.
    pub gamut: GamutMatrix,
}

impl ColorCorrection {
    /// Runs a color through both corrections.
    pub fn apply(&self, c: Rgb12) -> Rgb12 {
        self.gamut.apply(self.white_balance.apply(c))
    }
}
