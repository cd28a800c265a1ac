//! The instruction set of the pattern VM.

use crate::color::Rgb12;

/// Maximum number of tokens in one pattern.
pub const MAX_TOKENS: usize = 64;

/// A tokenized pattern, fixed at creation time.
pub type TokenVec = heapless::Vec<Token, MAX_TOKENS>;

/// One instruction of the pattern language.
///
/// Tokens are plain values: no token owns memory, so copying one is a
/// shallow copy and a whole program can live inline in its pattern.
/// Jump targets are resolved to token indices at tokenize time, which
/// keeps the program free of self-references.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    /// `#RRGGBB` — latch a new color, already log-expanded to 12 bits.
    /// White balance and gamut are applied at execution.
    Color(Rgb12),
    /// `@` — toggle the pattern's visibility.
    Transparent,
    /// `|n` — park the pattern for `total` ticks. `remaining` counts down
    /// in place while the sleep runs.
    Sleep {
        /// Tick count the sleep was written with.
        total: u32,
        /// Ticks left; 0 means the sleep is not armed yet.
        remaining: u32,
    },
    /// `\x08d` — add a signed delta to the pattern's brightness.
    Brightness(f32),
    /// `+` — increment the value at the top of the data stack.
    Increment,
    /// `-` — decrement the value at the top of the data stack.
    Decrement,
    /// `;` — hold the pattern here forever.
    Forever,
    /// `]` — jump to `target` if the top of the data stack is nonzero.
    JumpNz {
        /// Index of the matching [`Token::Mark`].
        target: u16,
    },
    /// `[` — jump anchor; a no-op at runtime.
    Mark,
    /// `<n` — push a value onto the data stack.
    Push(i16),
    /// `>` — pop the top of the data stack.
    Pop,
}
