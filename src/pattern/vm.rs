//! The pattern virtual machine.
//!
//! One [`Pattern`] is one running program: a token array plus a program
//! counter, a small signed-integer data stack, a brightness register, and
//! the current output color. Each tick advances a pattern by exactly one
//! tick-consuming instruction (`Sleep`, `Forever`, a taken `JumpNz`);
//! every other instruction falls through, so a program with no
//! tick-consuming instruction runs to completion inside a single tick.
//!
//! A pattern that walks off the end of its program is finished: it stops
//! executing but keeps its final color and visibility, and the controller
//! leaves it on its lamp stacks as a background layer until deleted. A
//! data stack overflow or underflow instead faults the pattern, which the
//! controller removes; a broken program must never take down the tick.

use crate::color::{rgb12_brightness, ColorCorrection, Rgb12, BLACK};
use crate::pattern::token::{Token, TokenVec};

/// Depth of the VM data stack.
pub const MAX_STACK: usize = 10;

/// Outcome of advancing a pattern by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// The pattern consumed the tick and will continue.
    Continue,
    /// The program ran off its end; the pattern is now a passive
    /// background layer.
    Done,
    /// Stack overflow or underflow; the pattern must be removed.
    Fault,
}

/// A running (or finished) pattern program.
#[derive(Debug, Clone)]
pub struct Pattern {
    id: u16,
    tokens: TokenVec,
    pc: u16,
    stack: [i16; MAX_STACK],
    sp: u8,
    brightness: f32,
    base_color: Rgb12,
    color: Rgb12,
    visible: bool,
}

impl Pattern {
    /// Wraps a tokenized program into a fresh VM instance.
    pub(crate) fn new(id: u16, tokens: TokenVec) -> Self {
        Pattern {
            id,
            tokens,
            pc: 0,
            stack: [0; MAX_STACK],
            sp: 0,
            brightness: 1.0,
            base_color: BLACK,
            color: BLACK,
            visible: true,
        }
    }

    /// Swaps in a new program and resets all VM state. The id and the
    /// pattern's lamp assignments are kept.
    pub(crate) fn reset(&mut self, tokens: TokenVec) {
        self.tokens = tokens;
        self.pc = 0;
        self.stack = [0; MAX_STACK];
        self.sp = 0;
        self.brightness = 1.0;
        self.base_color = BLACK;
        self.color = BLACK;
        self.visible = true;
    }

    /// The pattern id.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The color this pattern currently shows.
    pub fn color(&self) -> Rgb12 {
        self.color
    }

    /// Whether the pattern takes part in composition.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// True once the program has run off its end.
    pub(crate) fn is_finished(&self) -> bool {
        self.pc as usize >= self.tokens.len()
    }

    /// Advances the pattern by one tick.
    ///
    /// Runs instructions until one consumes the tick or the program ends.
    /// `changed` is raised whenever the pattern's visible state (color,
    /// brightness, transparency) moved.
    pub(crate) fn step(&mut self, correction: &ColorCorrection, changed: &mut bool) -> Step {
        loop {
            let pc = self.pc as usize;
            if pc >= self.tokens.len() {
                return Step::Done;
            }
            match self.tokens[pc] {
                Token::Color(raw) => {
                    self.base_color = correction.apply(raw);
                    self.color = self.base_color;
                    self.brightness = 1.0;
                    *changed = true;
                    if self.advance() {
                        return Step::Done;
                    }
                }

                Token::Transparent => {
                    self.visible = !self.visible;
                    *changed = true;
                    if self.advance() {
                        return Step::Done;
                    }
                }

                Token::Sleep { total, remaining } => {
                    if remaining == 0 {
                        // First encounter arms the countdown.
                        self.tokens[pc] = Token::Sleep { total, remaining: total };
                        return Step::Continue;
                    }
                    let remaining = remaining - 1;
                    self.tokens[pc] = Token::Sleep { total, remaining };
                    if remaining != 0 {
                        return Step::Continue;
                    }
                    if self.advance() {
                        return Step::Done;
                    }
                }

                Token::Brightness(delta) => {
                    self.brightness = (self.brightness + delta).clamp(0.0, 1.0);
                    self.color = rgb12_brightness(self.base_color, self.brightness);
                    *changed = true;
                    if self.advance() {
                        return Step::Done;
                    }
                }

                Token::Increment => {
                    self.stack[self.sp as usize] = self.stack[self.sp as usize].wrapping_add(1);
                    if self.advance() {
                        return Step::Done;
                    }
                }

                Token::Decrement => {
                    self.stack[self.sp as usize] = self.stack[self.sp as usize].wrapping_sub(1);
                    if self.advance() {
                        return Step::Done;
                    }
                }

                Token::Forever => {
                    // Collapse the program to the single Forever token;
                    // the rest of it can never execute again.
                    if self.tokens.len() > 1 {
                        self.tokens.clear();
                        let _ = self.tokens.push(Token::Forever);
                        self.pc = 0;
                    }
                    return Step::Continue;
                }

                Token::JumpNz { target } => {
                    if self.stack[self.sp as usize] != 0 {
                        self.pc = target;
                        return Step::Continue;
                    }
                    if self.advance() {
                        return Step::Done;
                    }
                }

                Token::Mark => {
                    if self.advance() {
                        return Step::Done;
                    }
                }

                Token::Push(value) => {
                    self.sp += 1;
                    if self.sp as usize == MAX_STACK {
                        return Step::Fault;
                    }
                    self.stack[self.sp as usize] = value;
                    if self.advance() {
                        return Step::Done;
                    }
                }

                Token::Pop => {
                    if self.sp == 0 {
                        return Step::Fault;
                    }
                    self.sp -= 1;
                    if self.advance() {
                        return Step::Done;
                    }
                }
            }
        }
    }

    /// Moves past the current token; true when the program just ended.
    fn advance(&mut self) -> bool {
        self.pc += 1;
        self.pc as usize == self.tokens.len()
    }
}
