//! # Control System
//!
//! [`Controller`] owns everything between the pattern language and the
//! wire: the live patterns, the per-lamp layer stacks, the packed frame
//! buffer, the color correction, and the strobe driver.
//!
//! ## Layering
//!
//! Each lamp carries a stack of pattern ids; the newest [`set`] lands on
//! top. Composition walks the stack top-down and takes the first visible
//! pattern's color. Transparent layers are skipped, and if every layer is
//! transparent the bottom one is used anyway — the bottom of the stack is
//! the lamp's background. An empty stack renders black.
//!
//! A pattern whose program has finished stays on its stacks as a passive
//! background layer, holding its final color until it is explicitly
//! deleted. A pattern that faults (data stack overflow or underflow) is
//! removed on the spot; broken programs are dropped, never propagated.
//!
//! ## Ticking
//!
//! An external periodic source — typically a timer interrupt — calls
//! [`tick`]. One tick advances every running pattern by one step,
//! recomposites the lamps if anything visible moved, and latches the
//! frame through the driver. Mutating calls serialize against the tick
//! with a counter lock: they hold it across their critical sections, and
//! a tick that finds the lock taken skips itself entirely. Dropping one
//! frame is imperceptible at tick rates; blocking inside an interrupt
//! handler is not an option.
//!
//! [`set`]: Controller::set
//! [`tick`]: Controller::tick

use heapless::Vec;

use crate::color::{
    format_hex, rgb12_to_rgb8, ColorCorrection, GamutMatrix, WhiteBalance, BLACK,
};
use crate::driver::FrameWriter;
use crate::error::Error;
use crate::frame::{self, FRAME_LEN, LAMP_COUNT};
use crate::pattern::{tokenize, Pattern, Step};

/// Maximum number of live patterns per device.
pub const MAX_PATTERNS: usize = 32;

/// Maximum number of layered patterns per lamp.
pub const MAX_LAYERS: usize = 8;

/// Id map entry for a lamp with no physical channel.
const DISABLED: u8 = 0xFF;

/// Driver for one TLC5947 device: 8 RGB lamps animated by patterns.
///
/// # Example
///
/// ```rust,ignore
/// let mut leds = Controller::new(Tlc5947Spi::new(spi, xlat, blank));
///
/// // A green background with a white blinker over it.
/// leds.set(&[0], "#00FF00")?;
/// let blinker = leds.set(&[0], "+[#FFFFFF|500@|500@]")?;
///
/// // From the periodic timer:
/// leds.tick()?;
///
/// // Later: remove the blinker, the background shows again.
/// leds.delete(blinker);
/// ```
pub struct Controller<D> {
    driver: D,
    patterns: Vec<Pattern, MAX_PATTERNS>,
    pid: u16,
    stacks: [Vec<u16, MAX_LAYERS>; LAMP_COUNT],
    buffer: [u8; FRAME_LEN],
    id_map: [u8; LAMP_COUNT],
    correction: ColorCorrection,
    changed: bool,
    lock: u8,
}

impl<D: FrameWriter> Controller<D> {
    /// Creates a controller over a strobe driver.
    ///
    /// The id map starts as identity, correction as identity, and the
    /// first tick latches an all-black frame.
    pub fn new(driver: D) -> Self {
        Controller {
            driver,
            patterns: Vec::new(),
            pid: 0,
            stacks: core::array::from_fn(|_| Vec::new()),
            buffer: [0; FRAME_LEN],
            id_map: core::array::from_fn(|i| i as u8),
            correction: ColorCorrection::default(),
            changed: true,
            lock: 0,
        }
    }

    /// Installs a pattern on one or more lamps, returning its id.
    ///
    /// The pattern string is tokenized before anything changes, so a
    /// rejected pattern leaves no trace. If a lamp translation or a
    /// capacity limit fails partway, the freshly-installed pattern and
    /// every stack entry it already got are rolled back.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`], [`Error::InvalidLamp`], [`Error::Capacity`].
    pub fn set(&mut self, lamps: &[u8], src: &str) -> Result<u16, Error> {
        let tokens = tokenize(src)?;

        self.lock += 1;
        if self.patterns.is_full() {
            self.lock -= 1;
            return Err(Error::Capacity);
        }
        let pid = self.alloc_pid();
        let _ = self.patterns.push(Pattern::new(pid, tokens));
        self.lock -= 1;

        for &lamp in lamps {
            let phys = match self.physical_lamp(lamp) {
                Ok(phys) => phys,
                Err(err) => {
                    self.remove_pattern(pid);
                    return Err(err);
                }
            };
            self.lock += 1;
            if self.stacks[phys].push(pid).is_err() {
                self.lock -= 1;
                self.remove_pattern(pid);
                return Err(Error::Capacity);
            }
            self.lock -= 1;
        }

        Ok(pid)
    }

    /// Swaps a new program into an existing pattern.
    ///
    /// The VM is fully reset; the pattern keeps its id and its place on
    /// every lamp stack. Returns the (unchanged) id.
    ///
    /// # Errors
    ///
    /// [`Error::Parse`], [`Error::InvalidPatternId`].
    pub fn replace(&mut self, pid: u16, src: &str) -> Result<u16, Error> {
        let tokens = tokenize(src)?;

        if pid == 0 {
            return Err(Error::InvalidPatternId);
        }
        let pos = self
            .patterns
            .iter()
            .position(|p| p.id() == pid)
            .ok_or(Error::InvalidPatternId)?;

        self.lock += 1;
        self.patterns[pos].reset(tokens);
        self.lock -= 1;

        Ok(pid)
    }

    /// Deletes a pattern, removing it from every lamp stack.
    ///
    /// Returns whether the pattern existed. Always schedules a
    /// recomposition, so an uncovered background repaints on the next
    /// tick.
    pub fn delete(&mut self, pid: u16) -> bool {
        self.changed = true;
        self.remove_pattern(pid)
    }

    /// Whether a pattern with this id is installed. Always false for the
    /// reserved id 0.
    pub fn exists(&self, pid: u16) -> bool {
        pid != 0 && self.patterns.iter().any(|p| p.id() == pid)
    }

    /// Reads a lamp's current color out of the frame buffer as
    /// `"#RRGGBB"`.
    ///
    /// The value reflects the last composited frame: truncating 12→8-bit
    /// down-conversion of whatever was latched for this lamp.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLamp`] if the lamp is out of range or disabled.
    pub fn get(&self, lamp: u8) -> Result<heapless::String<7>, Error> {
        let phys = self.physical_lamp(lamp)?;
        Ok(format_hex(rgb12_to_rgb8(frame::get_lamp(&self.buffer, phys))))
    }

    /// Remaps logical lamp indices to physical channels.
    ///
    /// Entries are `0..=8` for a channel or `-1` to disable the lamp. On
    /// any out-of-range entry the whole map resets to identity before the
    /// error returns.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidIdMap`].
    pub fn set_id_map(&mut self, map: [i8; LAMP_COUNT]) -> Result<(), Error> {
        self.lock += 1;
        for (i, &entry) in map.iter().enumerate() {
            match entry {
                0..=8 => self.id_map[i] = entry as u8,
                -1 => self.id_map[i] = DISABLED,
                _ => {
                    self.id_map = core::array::from_fn(|k| k as u8);
                    self.lock -= 1;
                    return Err(Error::InvalidIdMap);
                }
            }
        }
        self.lock -= 1;
        Ok(())
    }

    /// Sets the white balance; each factor is clamped to [0, 1].
    ///
    /// Takes effect for colors executed after the call.
    pub fn set_white_balance(&mut self, v: [f32; 3]) {
        self.lock += 1;
        self.correction.white_balance = WhiteBalance::new(v[0], v[1], v[2]);
        self.lock -= 1;
    }

    /// Sets the gamut matrix; entries are clamped to [0, 1].
    ///
    /// The no-amplification invariant (row sums ≤ 1.0) is then checked;
    /// an invalid matrix resets the gamut to identity before the error
    /// returns.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidGamut`].
    pub fn set_gamut(&mut self, m: [[f32; 3]; 3]) -> Result<(), Error> {
        let mut clamped = m;
        for row in clamped.iter_mut() {
            for entry in row.iter_mut() {
                *entry = entry.clamp(0.0, 1.0);
            }
        }
        let gamut = GamutMatrix(clamped);

        self.lock += 1;
        if !gamut.is_valid() {
            self.correction.gamut = GamutMatrix::identity();
            self.lock -= 1;
            return Err(Error::InvalidGamut);
        }
        self.correction.gamut = gamut;
        self.lock -= 1;
        Ok(())
    }

    /// Drives the BLANK line; `true` forces all outputs off.
    pub fn blank(&mut self, on: bool) -> Result<(), D::Error> {
        self.driver.blank(on)
    }

    /// Advances the animation by one tick.
    ///
    /// Skips entirely (dropping the frame) when a mutator holds the lock.
    /// Otherwise: steps every running pattern in insertion order, removes
    /// faulted ones, and — if any visible state moved — recomposites all
    /// lamps and latches the frame.
    ///
    /// Safe to call from interrupt context; the only failure path is the
    /// driver's.
    pub fn tick(&mut self) -> Result<(), D::Error> {
        if self.lock != 0 {
            return Ok(());
        }

        let mut faulted: Vec<u16, MAX_PATTERNS> = Vec::new();
        for i in 0..self.patterns.len() {
            if self.patterns[i].is_finished() {
                continue;
            }
            let pid = self.patterns[i].id();
            if self.patterns[i].step(&self.correction, &mut self.changed) == Step::Fault {
                let _ = faulted.push(pid);
            }
        }
        for &pid in &faulted {
            self.changed = true;
            self.remove_pattern(pid);
        }

        if self.changed {
            self.composite();
            self.changed = false;
            self.driver.latch(&self.buffer)?;
        }
        Ok(())
    }

    /// Composites every lamp from its layer stack into the frame buffer.
    fn composite(&mut self) {
        for lamp in 0..LAMP_COUNT {
            let mut color = BLACK;
            for &pid in self.stacks[lamp].iter().rev() {
                if let Some(p) = self.patterns.iter().find(|p| p.id() == pid) {
                    color = p.color();
                    if p.visible() {
                        break;
                    }
                }
            }
            frame::set_lamp(&mut self.buffer, lamp, color);
        }
    }

    /// Hands out the next pattern id. Monotonic; skips the reserved 0 on
    /// wraparound.
    fn alloc_pid(&mut self) -> u16 {
        self.pid = self.pid.wrapping_add(1);
        if self.pid == 0 {
            self.pid = 1;
        }
        self.pid
    }

    /// Translates a logical lamp through the id map.
    fn physical_lamp(&self, lamp: u8) -> Result<usize, Error> {
        let phys = *self
            .id_map
            .get(lamp as usize)
            .ok_or(Error::InvalidLamp)?;
        if phys as usize >= LAMP_COUNT {
            return Err(Error::InvalidLamp);
        }
        Ok(phys as usize)
    }

    /// Strips a pattern from every lamp stack and the pattern list.
    /// Surviving entries keep their relative order.
    fn remove_pattern(&mut self, pid: u16) -> bool {
        self.lock += 1;
        for stack in self.stacks.iter_mut() {
            stack.retain(|&p| p != pid);
        }
        let removed = match self.patterns.iter().position(|p| p.id() == pid) {
            Some(pos) => {
                self.patterns.remove(pos);
                true
            }
            None => false,
        };
        self.lock -= 1;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    /// Records latched frames instead of talking to hardware.
    struct MockWriter {
        latches: usize,
        last_frame: [u8; FRAME_LEN],
        blanked: Option<bool>,
    }

    impl MockWriter {
        fn new() -> Self {
            MockWriter {
                latches: 0,
                last_frame: [0; FRAME_LEN],
                blanked: None,
            }
        }
    }

    impl FrameWriter for MockWriter {
        type Error = Infallible;

        fn latch(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), Infallible> {
            self.latches += 1;
            self.last_frame = *frame;
            Ok(())
        }

        fn blank(&mut self, on: bool) -> Result<(), Infallible> {
            self.blanked = Some(on);
            Ok(())
        }
    }

    fn controller() -> Controller<MockWriter> {
        Controller::new(MockWriter::new())
    }

    fn tick(c: &mut Controller<MockWriter>) {
        c.tick().unwrap();
    }

    fn ticks(c: &mut Controller<MockWriter>, n: usize) {
        for _ in 0..n {
            tick(c);
        }
    }

    #[test]
    fn startup_latches_black() {
        let mut c = controller();
        tick(&mut c);
        assert_eq!(c.driver.latches, 1);
        assert_eq!(c.driver.last_frame, [0; FRAME_LEN]);
        // Nothing changed: no further latches.
        tick(&mut c);
        assert_eq!(c.driver.latches, 1);
    }

    #[test]
    fn constant_color_becomes_background() {
        let mut c = controller();
        let pid = c.set(&[0], "#0000FF").unwrap();
        tick(&mut c);
        assert_eq!(c.get(0).unwrap().as_str(), "#0000FF");
        // The program finished but the pattern stays as a background.
        assert!(c.exists(pid));
        ticks(&mut c, 10);
        assert_eq!(c.get(0).unwrap().as_str(), "#0000FF");
    }

    #[test]
    fn blinker_alternates() {
        let mut c = controller();
        c.set(&[0], "+[#FFFFFF|500#000000|500]").unwrap();
        tick(&mut c);
        assert_eq!(c.get(0).unwrap().as_str(), "#FFFFFF");
        ticks(&mut c, 500);
        assert_eq!(c.get(0).unwrap().as_str(), "#000000");
        ticks(&mut c, 501);
        assert_eq!(c.get(0).unwrap().as_str(), "#FFFFFF");
    }

    #[test]
    fn stack_overflow_deletes_the_pattern() {
        let mut c = controller();
        let pid = c.set(&[0], "<1<1<1<1<1<1<1<1<1<1<1").unwrap();
        assert!(c.exists(pid));
        tick(&mut c);
        assert!(!c.exists(pid));
        for stack in &c.stacks {
            assert!(!stack.contains(&pid));
        }
    }

    #[test]
    fn top_layer_dominates_and_delete_reveals() {
        let mut c = controller();
        let pid_a = c.set(&[0], "#FF0000").unwrap();
        let pid_b = c.set(&[0], "#00FF00").unwrap();
        tick(&mut c);
        assert_eq!(c.get(0).unwrap().as_str(), "#00FF00");
        assert!(c.delete(pid_b));
        tick(&mut c);
        assert_eq!(c.get(0).unwrap().as_str(), "#FF0000");
        assert!(c.exists(pid_a));
    }

    #[test]
    fn transparent_layer_is_skipped() {
        let mut c = controller();
        c.set(&[0], "#FF0000").unwrap();
        c.set(&[0], "@#00FF00").unwrap();
        tick(&mut c);
        assert_eq!(c.get(0).unwrap().as_str(), "#FF0000");
    }

    #[test]
    fn all_transparent_falls_back_to_bottom() {
        let mut c = controller();
        c.set(&[0], "@#FF0000;").unwrap();
        c.set(&[0], "@#00FF00;").unwrap();
        tick(&mut c);
        assert_eq!(c.get(0).unwrap().as_str(), "#FF0000");
    }

    #[test]
    fn empty_stack_renders_black() {
        let mut c = controller();
        let pid = c.set(&[0], "#FF0000").unwrap();
        tick(&mut c);
        c.delete(pid);
        tick(&mut c);
        assert_eq!(c.get(0).unwrap().as_str(), "#000000");
    }

    #[test]
    fn pids_are_unique_and_increasing() {
        let mut c = controller();
        let a = c.set(&[0], "#FF0000").unwrap();
        let b = c.set(&[1], "#00FF00").unwrap();
        let d = c.set(&[2], "#0000FF").unwrap();
        assert!(0 < a && a < b && b < d);
        assert!(c.exists(a) && c.exists(b) && c.exists(d));
        assert!(!c.exists(0));
    }

    #[test]
    fn delete_is_surgical() {
        let mut c = controller();
        let a = c.set(&[0, 1], "#FF0000").unwrap();
        let b = c.set(&[0], "#00FF00").unwrap();
        let d = c.set(&[1], "#0000FF").unwrap();
        assert!(c.delete(b));
        assert!(!c.exists(b));
        assert!(!c.delete(b));
        assert!(c.exists(a) && c.exists(d));
        // Survivors keep their relative order.
        let ids: Vec<u16, MAX_PATTERNS> = c.patterns.iter().map(|p| p.id()).collect();
        assert_eq!(ids.as_slice(), &[a, d]);
        assert_eq!(c.stacks[0].as_slice(), &[a]);
        assert_eq!(c.stacks[1].as_slice(), &[a, d]);
    }

    #[test]
    fn parse_failure_changes_nothing() {
        let mut c = controller();
        c.set(&[0], "#FF0000").unwrap();
        let patterns_before = c.patterns.len();
        let stack_before = c.stacks[0].clone();
        assert_eq!(c.set(&[0], "#XYZ"), Err(Error::Parse(crate::error::ParseError::InvalidColor)));
        assert_eq!(c.set(&[0], "]"), Err(Error::Parse(crate::error::ParseError::UnbalancedJumps)));
        assert_eq!(c.patterns.len(), patterns_before);
        assert_eq!(c.stacks[0], stack_before);
    }

    #[test]
    fn invalid_lamp_rolls_back_the_pattern() {
        let mut c = controller();
        assert_eq!(c.set(&[9], "#FF0000"), Err(Error::InvalidLamp));
        assert!(c.patterns.is_empty());
        // Multi-lamp set: valid lamps first, then a bad one.
        assert_eq!(c.set(&[0, 1, 9], "#FF0000"), Err(Error::InvalidLamp));
        assert!(c.patterns.is_empty());
        assert!(c.stacks[0].is_empty() && c.stacks[1].is_empty());
    }

    #[test]
    fn multi_lamp_set_shares_one_pattern() {
        let mut c = controller();
        let pid = c.set(&[0, 3, 7], "#123456").unwrap();
        tick(&mut c);
        assert_eq!(c.stacks[0].as_slice(), &[pid]);
        assert_eq!(c.stacks[3].as_slice(), &[pid]);
        assert_eq!(c.stacks[7].as_slice(), &[pid]);
        assert_eq!(c.get(0).unwrap(), c.get(3).unwrap());
    }

    #[test]
    fn replace_swaps_program_and_keeps_lamps() {
        let mut c = controller();
        let pid = c.set(&[0], "#FF0000").unwrap();
        tick(&mut c);
        assert_eq!(c.replace(pid, "#00FF00"), Ok(pid));
        tick(&mut c);
        assert_eq!(c.get(0).unwrap().as_str(), "#00FF00");
        assert_eq!(c.stacks[0].as_slice(), &[pid]);
        // Unknown or reserved ids are rejected.
        assert_eq!(c.replace(9999, "#FFFFFF"), Err(Error::InvalidPatternId));
        assert_eq!(c.replace(0, "#FFFFFF"), Err(Error::InvalidPatternId));
    }

    #[test]
    fn locked_tick_is_a_no_op() {
        let mut c = controller();
        c.set(&[0], "#FF0000").unwrap();
        c.lock += 1;
        tick(&mut c);
        assert_eq!(c.driver.latches, 0);
        assert_eq!(c.buffer, [0; FRAME_LEN]);
        c.lock -= 1;
        tick(&mut c);
        assert_eq!(c.driver.latches, 1);
        assert_eq!(c.get(0).unwrap().as_str(), "#FF0000");
    }

    #[test]
    fn latch_only_when_something_changed() {
        let mut c = controller();
        c.set(&[0], "#FF0000|100;").unwrap();
        tick(&mut c);
        let after_first = c.driver.latches;
        // The pattern is parked in its sleep: no visual changes.
        ticks(&mut c, 50);
        assert_eq!(c.driver.latches, after_first);
    }

    #[test]
    fn id_map_remaps_and_disables() {
        let mut c = controller();
        c.set_id_map([3, -1, 0, 1, 2, 4, 5, 6]).unwrap();
        let pid = c.set(&[0], "#FF0000").unwrap();
        tick(&mut c);
        // Logical 0 drives physical 3.
        assert_eq!(c.stacks[3].as_slice(), &[pid]);
        assert_eq!(c.get(0).unwrap().as_str(), "#FF0000");
        // Disabled lamps reject everything.
        assert_eq!(c.set(&[1], "#FF0000"), Err(Error::InvalidLamp));
        assert_eq!(c.get(1), Err(Error::InvalidLamp));
    }

    #[test]
    fn bad_id_map_resets_to_identity() {
        let mut c = controller();
        c.set_id_map([7, 6, 5, 4, 3, 2, 1, 0]).unwrap();
        assert_eq!(c.set_id_map([0, 1, 2, 3, 9, 5, 6, 7]), Err(Error::InvalidIdMap));
        assert_eq!(c.id_map, [0, 1, 2, 3, 4, 5, 6, 7]);
        // Setting identity twice stays identity.
        c.set_id_map([0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        c.set_id_map([0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(c.id_map, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn white_balance_clamps() {
        let mut c = controller();
        c.set_white_balance([2.0, -1.0, 0.5]);
        assert_eq!(
            c.correction.white_balance,
            WhiteBalance { red: 1.0, green: 0.0, blue: 0.5 }
        );
    }

    #[test]
    fn white_balance_shapes_executed_colors() {
        let mut c = controller();
        c.set_white_balance([1.0, 0.0, 1.0]);
        c.set(&[0], "#FFFFFF").unwrap();
        tick(&mut c);
        assert_eq!(c.get(0).unwrap().as_str(), "#FF00FF");
    }

    #[test]
    fn invalid_gamut_resets_and_errors() {
        let mut c = controller();
        assert_eq!(
            c.set_gamut([[1.0, 1.0, 1.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]),
            Err(Error::InvalidGamut)
        );
        assert_eq!(c.correction.gamut, GamutMatrix::identity());
        // A valid matrix sticks.
        let m = [[0.8, 0.1, 0.1], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        c.set_gamut(m).unwrap();
        assert_eq!(c.correction.gamut, GamutMatrix(m));
    }

    #[test]
    fn blank_passes_through() {
        let mut c = controller();
        c.blank(true).unwrap();
        assert_eq!(c.driver.blanked, Some(true));
        c.blank(false).unwrap();
        assert_eq!(c.driver.blanked, Some(false));
    }

    #[test]
    fn forever_pattern_never_finishes() {
        let mut c = controller();
        let pid = c.set(&[0], "#FF0000;").unwrap();
        ticks(&mut c, 100);
        assert!(c.exists(pid));
        assert_eq!(c.get(0).unwrap().as_str(), "#FF0000");
    }

    #[test]
    fn capacity_exhaustion_is_clean() {
        let mut c = controller();
        for _ in 0..MAX_PATTERNS {
            c.set(&[], "#FF0000").unwrap();
        }
        assert_eq!(c.set(&[], "#FF0000"), Err(Error::Capacity));
        assert_eq!(c.patterns.len(), MAX_PATTERNS);
        // Per-lamp layer capacity, with rollback of the overflowing set.
        let mut c = controller();
        for _ in 0..MAX_LAYERS {
            c.set(&[0], "#FF0000").unwrap();
        }
        let patterns_before = c.patterns.len();
        assert_eq!(c.set(&[0], "#00FF00"), Err(Error::Capacity));
        assert_eq!(c.patterns.len(), patterns_before);
        assert_eq!(c.stacks[0].len(), MAX_LAYERS);
    }

    #[test]
    fn fade_program_dims_over_time() {
        let mut c = controller();
        c.set(&[0], "#FFFFFF\x08-0.5|10;").unwrap();
        tick(&mut c);
        // Brightness 0.5 through the log curve is a 0.1549 gain.
        let s = c.get(0).unwrap();
        assert_ne!(s.as_str(), "#FFFFFF");
        assert_ne!(s.as_str(), "#000000");
    }
}
