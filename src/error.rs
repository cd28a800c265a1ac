//! # Error Types
//!
//! Failures surfaced by the pattern language and the controller API.
//!
//! Two layers:
//!
//! - [`ParseError`]: a pattern string was rejected before any state changed
//! - [`Error`]: the controller-level error, covering parse failures,
//!   lookups, configuration domain checks, and capacity exhaustion
//!
//! Strobe-driver failures (SPI, pins) are a separate concern; see
//! [`DriverError`](crate::driver::DriverError).

/// Reasons a pattern string fails to tokenize.
///
/// Raised by [`set`](crate::control::Controller::set) and
/// [`replace`](crate::control::Controller::replace) before any controller
/// state is touched; a rejected pattern is never partially installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// `[` and `]` do not pair up.
    UnbalancedJumps,
    /// A `#` is not followed by six hexadecimal digits.
    InvalidColor,
    /// A non-space character matched no lexeme.
    UnknownCharacter,
    /// The string contains no tokens at all.
    Empty,
}

/// Controller-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The pattern string was rejected; see [`ParseError`].
    Parse(ParseError),
    /// The lamp index is out of range or disabled in the id map.
    InvalidLamp,
    /// No pattern with this id exists (or the id is the reserved 0).
    InvalidPatternId,
    /// An id map entry was outside {-1} ∪ {0..=8}. The map has been reset
    /// to identity.
    InvalidIdMap,
    /// A gamut row summed above 1.0. The gamut has been reset to identity.
    InvalidGamut,
    /// A fixed-capacity store is full. Any partially-installed pattern has
    /// been rolled back.
    Capacity,
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}
