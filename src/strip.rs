//! Blade LED animation.
//!
//! Driven from the same 1 ms tick as the button. One animation runs at a
//! time:
//!
//! - **turning on**: one more LED lit every `turn_on_ms_per_led` ticks
//!   until the whole strip shows the idle color;
//! - **turning off**: the reverse, down to zero;
//! - **flashing**: alternates between the brighter flash color and the idle
//!   color with random phase lengths, then settles on the idle color.
//!
//! A turn-on or turn-off request is ignored while either is in progress.

use smart_leds::{RGB8, SmartLedsWrite};

use crate::config::{FlashTiming, StripTiming};
use crate::fmt::{trace, warn};
use crate::palette::{OFF, PaletteEntry};
use crate::random::{RandomSource, rand_pow2, rand_pow2_range};

/// Current animation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StripMode {
    Idle,
    TurningOn,
    TurningOff,
    Flashing,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum FlashPhase {
    Bright,
    Normal,
}

#[derive(Clone, Copy, Debug)]
struct Flash {
    remaining: u32,
    phase: FlashPhase,
    deadline: u32,
}

#[derive(Clone, Copy, Debug)]
enum Animation {
    Idle,
    TurningOn,
    TurningOff,
    Flashing(Flash),
}

/// Animator for an `N`-pixel strip.
pub struct Strip<W, R, const N: usize> {
    writer: W,
    rng: R,
    palette: &'static [PaletteEntry],
    timing: StripTiming,
    flash_timing: FlashTiming,
    animation: Animation,
    lit: usize,
    tick_accumulator: u32,
    color_index: usize,
}

impl<W, R, const N: usize> Strip<W, R, N>
where
    W: SmartLedsWrite<Color = RGB8>,
    R: RandomSource,
{
    /// Creates an animator on the first palette entry with every pixel off.
    pub fn new(
        writer: W,
        rng: R,
        palette: &'static [PaletteEntry],
        timing: StripTiming,
        flash_timing: FlashTiming,
    ) -> Self {
        let mut strip = Self {
            writer,
            rng,
            palette,
            timing,
            flash_timing,
            animation: Animation::Idle,
            lit: 0,
            tick_accumulator: 0,
            color_index: 0,
        };
        strip.fill(OFF, 0);
        strip
    }

    fn entry(&self) -> PaletteEntry {
        self.palette
            .get(self.color_index)
            .copied()
            .unwrap_or(PaletteEntry { idle: OFF, flash: OFF })
    }

    /// Pushes `lit` pixels of `color` followed by dark pixels.
    fn fill(&mut self, color: RGB8, lit: usize) {
        let frame = (0..N).map(|i| if i < lit { color } else { OFF });
        if self.writer.write(frame).is_err() {
            warn!("strip: pixel write failed");
        }
    }

    /// Advances the running animation by one tick.
    pub fn tick(&mut self) {
        match self.animation {
            Animation::TurningOn => {
                self.tick_accumulator += 1;
                if self.tick_accumulator >= self.timing.turn_on_ms_per_led {
                    self.tick_accumulator = 0;
                    self.lit = (self.lit + 1).min(N);
                    self.fill(self.entry().idle, self.lit);
                    if self.lit == N {
                        self.animation = Animation::Idle;
                    }
                }
            }
            Animation::TurningOff => {
                self.tick_accumulator += 1;
                if self.tick_accumulator >= self.timing.turn_off_ms_per_led {
                    self.tick_accumulator = 0;
                    self.lit = self.lit.saturating_sub(1);
                    self.fill(self.entry().idle, self.lit);
                    if self.lit == 0 {
                        self.animation = Animation::Idle;
                    }
                }
            }
            Animation::Flashing(flash) => {
                self.tick_accumulator = 0;
                self.tick_flash(flash);
            }
            Animation::Idle => {
                self.tick_accumulator = 0;
            }
        }
    }

    fn tick_flash(&mut self, mut flash: Flash) {
        // A zero deadline expires on the next tick.
        flash.deadline = flash.deadline.saturating_sub(1);
        if flash.deadline != 0 {
            self.animation = Animation::Flashing(flash);
            return;
        }

        if flash.phase == FlashPhase::Bright {
            flash.remaining = flash.remaining.saturating_sub(1);
        }
        let entry = self.entry();
        if flash.remaining == 0 {
            self.fill(entry.idle, N);
            self.animation = Animation::Idle;
            return;
        }

        match flash.phase {
            FlashPhase::Bright => {
                let (min, max) = self.flash_timing.off_range;
                flash.deadline = rand_pow2_range(&self.rng, min, max);
                flash.phase = FlashPhase::Normal;
                self.fill(entry.idle, N);
            }
            FlashPhase::Normal => {
                let (min, max) = self.flash_timing.on_range;
                flash.deadline = rand_pow2_range(&self.rng, min, max);
                flash.phase = FlashPhase::Bright;
                self.fill(entry.flash, N);
            }
        }
        self.animation = Animation::Flashing(flash);
    }

    /// Starts lighting the strip from the base. Cancels a flash.
    pub fn turn_on(&mut self) {
        if self.is_turning() {
            return;
        }
        self.animation = Animation::TurningOn;
        self.lit = 0;
        self.tick_accumulator = 0;
        trace!("strip: turning on");
    }

    /// Starts darkening the strip from the tip. Cancels a flash.
    pub fn turn_off(&mut self) {
        if self.is_turning() {
            return;
        }
        self.animation = Animation::TurningOff;
        self.lit = N;
        self.tick_accumulator = 0;
        trace!("strip: turning off");
    }

    /// Moves to the next palette color and repaints the lit pixels.
    ///
    /// Does nothing with a single-color palette.
    pub fn next_color(&mut self) {
        if self.palette.len() <= 1 {
            return;
        }
        self.color_index = (self.color_index + 1) % self.palette.len();
        self.fill(self.entry().idle, self.lit);
    }

    /// Picks a random idle color, never the last palette slot.
    pub fn set_random_color(&mut self) {
        if self.palette.len() <= 1 {
            return;
        }
        let choices = (self.palette.len() - 1) as u32;
        self.color_index = (rand_pow2(&self.rng, 3) % choices) as usize;
    }

    /// Starts a clash flash with a random count and phase lengths.
    ///
    /// A flash already in progress starts over with fresh draws, so every
    /// clash gets a full sequence. Ignored while turning on or off.
    pub fn flash(&mut self) {
        if self.is_turning() {
            return;
        }
        let remaining = rand_pow2_range(&self.rng, 0, self.flash_timing.count_bits) + 1;
        let (min, max) = self.flash_timing.on_range;
        let deadline = rand_pow2_range(&self.rng, min, max);
        self.animation = Animation::Flashing(Flash {
            remaining,
            phase: FlashPhase::Normal,
            deadline,
        });
        trace!("strip: flashing {} times", remaining);
    }

    /// Cancels any animation and darkens every pixel.
    pub fn clear(&mut self) {
        self.animation = Animation::Idle;
        self.lit = 0;
        self.tick_accumulator = 0;
        self.fill(OFF, N);
    }

    fn is_turning(&self) -> bool {
        matches!(self.animation, Animation::TurningOn | Animation::TurningOff)
    }

    /// The running animation.
    pub fn mode(&self) -> StripMode {
        match self.animation {
            Animation::Idle => StripMode::Idle,
            Animation::TurningOn => StripMode::TurningOn,
            Animation::TurningOff => StripMode::TurningOff,
            Animation::Flashing(_) => StripMode::Flashing,
        }
    }

    /// True while any animation is running.
    pub fn is_animating(&self) -> bool {
        !matches!(self.animation, Animation::Idle)
    }

    /// Number of pixels currently lit.
    pub fn lit(&self) -> usize {
        self.lit
    }

    /// Palette slot of the current color.
    pub fn color_index(&self) -> usize {
        self.color_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette;
    use crate::random::tests::ScriptedBits;

    const TIMING: StripTiming = StripTiming {
        turn_on_ms_per_led: 30,
        turn_off_ms_per_led: 30,
    };

    const FLASH: FlashTiming = FlashTiming {
        count_bits: 12,
        on_range: (6, 12),
        off_range: (16, 32),
    };

    /// Keeps the last frame pushed and counts writes.
    #[derive(Default)]
    struct FrameLog {
        last: Vec<RGB8>,
        writes: usize,
    }

    impl SmartLedsWrite for FrameLog {
        type Error = core::convert::Infallible;
        type Color = RGB8;

        fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
        where
            T: IntoIterator<Item = I>,
            I: Into<Self::Color>,
        {
            self.last = iterator.into_iter().map(Into::into).collect();
            self.writes += 1;
            Ok(())
        }
    }

    type TestStrip = Strip<FrameLog, ScriptedBits, 25>;

    fn strip(palette: &'static [PaletteEntry], rng: ScriptedBits) -> TestStrip {
        Strip::new(FrameLog::default(), rng, palette, TIMING, FLASH)
    }

    fn ticks(strip: &mut TestStrip, n: u32) {
        for _ in 0..n {
            strip.tick();
        }
    }

    fn lit_pixels(strip: &TestStrip) -> usize {
        strip.writer.last.iter().filter(|p| **p != OFF).count()
    }

    #[test]
    fn starts_dark() {
        let s = strip(palette::FULL, ScriptedBits::constant(false));
        assert_eq!(s.writer.last.len(), 25);
        assert_eq!(lit_pixels(&s), 0);
        assert_eq!(s.mode(), StripMode::Idle);
    }

    #[test]
    fn turn_on_lights_whole_strip_after_n_times_interval() {
        let mut s = strip(palette::FULL, ScriptedBits::constant(false));
        s.turn_on();
        ticks(&mut s, 25 * 30 - 1);
        assert_eq!(s.lit(), 24);
        assert_eq!(s.mode(), StripMode::TurningOn);

        ticks(&mut s, 1);
        assert_eq!(s.lit(), 25);
        assert_eq!(lit_pixels(&s), 25);
        assert_eq!(s.mode(), StripMode::Idle);
        assert!(s.writer.last.iter().all(|p| *p == palette::FULL[0].idle));

        let writes = s.writer.writes;
        ticks(&mut s, 500);
        assert_eq!(s.writer.writes, writes);
        assert_eq!(s.lit(), 25);
    }

    #[test]
    fn turn_off_darkens_one_led_per_interval() {
        let mut s = strip(palette::FULL, ScriptedBits::constant(false));
        s.turn_on();
        ticks(&mut s, 750);
        s.turn_off();
        ticks(&mut s, 30);
        assert_eq!(lit_pixels(&s), 24);
        ticks(&mut s, 24 * 30);
        assert_eq!(lit_pixels(&s), 0);
        assert_eq!(s.mode(), StripMode::Idle);
    }

    #[test]
    fn turning_on_and_off_are_mutually_exclusive() {
        let mut s = strip(palette::FULL, ScriptedBits::constant(false));
        s.turn_on();
        ticks(&mut s, 90);
        s.turn_off();
        assert_eq!(s.mode(), StripMode::TurningOn);
        assert_eq!(s.lit(), 3);

        ticks(&mut s, 750);
        s.turn_off();
        s.turn_on();
        assert_eq!(s.mode(), StripMode::TurningOff);
        assert_eq!(s.lit(), 25);
    }

    #[test]
    fn next_color_steps_once_and_wraps() {
        let mut s = strip(palette::FULL, ScriptedBits::constant(false));
        s.turn_on();
        ticks(&mut s, 750);
        for expected in 1..palette::FULL.len() {
            s.next_color();
            assert_eq!(s.color_index(), expected);
            assert!(s.writer.last.iter().all(|p| *p == palette::FULL[expected].idle));
        }
        s.next_color();
        assert_eq!(s.color_index(), 0);
    }

    #[test]
    fn single_color_palette_never_changes() {
        let mut s = strip(palette::SINGLE, ScriptedBits::constant(true));
        s.next_color();
        s.set_random_color();
        assert_eq!(s.color_index(), 0);
    }

    #[test]
    fn random_color_excludes_last_slot() {
        // 0b111 % 8 == 7, the last slot allowed.
        let mut s = strip(palette::FULL, ScriptedBits::constant(true));
        s.set_random_color();
        assert_eq!(s.color_index(), 7);

        let mut s = strip(palette::FULL, ScriptedBits::new(&[false, true, false]));
        s.set_random_color();
        assert_eq!(s.color_index(), 2);
    }

    #[test]
    fn flash_alternates_then_restores_idle_color() {
        // All-ones bits: count draw halves to 0, so one flash; on phase
        // draws 0xFFF -> 3; off phase would draw 0xFFFFFFFF -> 15.
        let mut s = strip(palette::FULL, ScriptedBits::constant(true));
        s.turn_on();
        ticks(&mut s, 750);
        let idle = palette::FULL[0].idle;
        let bright = palette::FULL[0].flash;

        s.flash();
        assert_eq!(s.mode(), StripMode::Flashing);

        // Normal phase with deadline 3 expires, bright phase begins.
        ticks(&mut s, 3);
        assert!(s.writer.last.iter().all(|p| *p == bright));

        // Bright phase (deadline 3) completes the single flash.
        ticks(&mut s, 2);
        assert_eq!(s.mode(), StripMode::Flashing);
        ticks(&mut s, 1);
        assert_eq!(s.mode(), StripMode::Idle);
        assert!(s.writer.last.iter().all(|p| *p == idle));
    }

    #[test]
    fn clash_during_flash_restarts_sequence() {
        let mut s = strip(palette::FULL, ScriptedBits::constant(true));
        s.turn_on();
        ticks(&mut s, 750);
        let bright = palette::FULL[0].flash;

        s.flash();
        ticks(&mut s, 3);
        assert!(s.writer.last.iter().all(|p| *p == bright));

        // Three more ticks would end the first flash; the second clash
        // restarts from the normal phase instead.
        s.flash();
        ticks(&mut s, 3);
        assert_eq!(s.mode(), StripMode::Flashing);
        assert!(s.writer.last.iter().all(|p| *p == bright));

        ticks(&mut s, 2);
        assert_eq!(s.mode(), StripMode::Flashing);
        ticks(&mut s, 1);
        assert_eq!(s.mode(), StripMode::Idle);
        assert!(s.writer.last.iter().all(|p| *p == palette::FULL[0].idle));
    }

    #[test]
    fn zero_deadline_expires_next_tick() {
        let mut s = strip(palette::FULL, ScriptedBits::constant(false));
        s.turn_on();
        ticks(&mut s, 750);
        s.flash();
        ticks(&mut s, 1);
        assert!(s.writer.last.iter().all(|p| *p == palette::FULL[0].flash));
        ticks(&mut s, 1);
        assert_eq!(s.mode(), StripMode::Idle);
    }

    #[test]
    fn flash_is_ignored_while_turning_and_cancelled_by_turn_off() {
        let mut s = strip(palette::FULL, ScriptedBits::constant(true));
        s.turn_on();
        s.flash();
        assert_eq!(s.mode(), StripMode::TurningOn);

        ticks(&mut s, 750);
        s.flash();
        s.turn_off();
        assert_eq!(s.mode(), StripMode::TurningOff);
    }

    #[test]
    fn clear_darkens_everything() {
        let mut s = strip(palette::FULL, ScriptedBits::constant(false));
        s.turn_on();
        ticks(&mut s, 300);
        s.clear();
        assert_eq!(s.mode(), StripMode::Idle);
        assert_eq!(s.lit(), 0);
        assert_eq!(lit_pixels(&s), 0);
    }
}
