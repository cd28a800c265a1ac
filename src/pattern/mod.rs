//! # The Pattern Language
//!
//! Lamps are animated by small programs ("patterns") instead of per-tick
//! color writes. A pattern is a compact string of single-character
//! instructions, tokenized once and then executed by a tiny stack VM, one
//! step per tick:
//!
//! | Lexeme       | Meaning                                          |
//! |--------------|--------------------------------------------------|
//! | `#RRGGBB`    | latch a color                                    |
//! | `@`          | toggle transparency                              |
//! | `\|n`        | sleep for `n` ticks                              |
//! | `\x08d`      | add `d` (may be negative, fractional) to brightness |
//! | `<n`         | push `n` onto the data stack                     |
//! | `>`          | pop the data stack                               |
//! | `+` / `-`    | increment / decrement the top of the data stack  |
//! | `[`          | loop marker                                      |
//! | `]`          | jump back to the matching `[` if the top of the data stack is nonzero |
//! | `;`          | hold here forever                                |
//! | space        | ignored                                          |
//!
//! `\x08` is the ASCII backspace byte, the same character written as
//! `\b` in C string literals.
//!
//! ## Examples
//!
//! A blinker, toggling white and black every 500 ticks. The increment
//! makes the bottom stack value nonzero so the closing `]` always jumps:
//!
//! ```text
//! +[#FFFFFF|500#000000|500]
//! ```
//!
//! A plain color. The program finishes immediately, leaving the color as
//! a background layer that shows whenever every pattern stacked above it
//! is finished, transparent, or deleted:
//!
//! ```text
//! #0000FF
//! ```
//!
//! A bounded fade: five times, latch full red, then step brightness down
//! by 0.1 ten times at 50-tick intervals:
//!
//! ```text
//! <5[#FF0000<10[|50\x08-0.1-]>-|50]
//! ```

mod lexer;
mod token;
mod vm;

pub use lexer::tokenize;
pub use token::{Token, TokenVec, MAX_TOKENS};
pub use vm::{Pattern, Step, MAX_STACK};
