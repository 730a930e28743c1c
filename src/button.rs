//! Button debounce and press classification.
//!
//! The [`Debouncer`] runs in the 1 ms tick handler and owns all the
//! debounce state. It reports through [`ButtonEvents`], two latches the main
//! loop consumes at its own pace.
//!
//! # State machine
//!
//! ```text
//! Released ──raw wobble──▶ Debouncing ──stable N ticks──▶ Held
//!    ▲                                                     │
//!    │◀── release, hold < L: short press ──────────────────┤
//!    │                                                     │ hold == L
//!    │◀── release: no event ── LongLatched ◀── long press ─┘
//! ```
//!
//! Any change in the raw sample restarts the debounce window, so a bouncing
//! contact never commits. A release only counts as a short press if the
//! long-press threshold was not reached; there is no minimum press length.

use crate::config::ButtonTiming;
use crate::fmt::debug;
use crate::sync::EventLatch;

/// Classified press latches, consumed by the main loop.
pub struct ButtonEvents {
    short_press: EventLatch,
    long_press: EventLatch,
}

impl ButtonEvents {
    /// Creates the latches with nothing pending.
    pub const fn new() -> Self {
        Self {
            short_press: EventLatch::new(),
            long_press: EventLatch::new(),
        }
    }

    /// Consumes a pending short press.
    pub fn take_short(&self) -> bool {
        self.short_press.take()
    }

    /// Consumes a pending long press.
    pub fn take_long(&self) -> bool {
        self.long_press.take()
    }

    /// Discards both latches.
    pub fn clear(&self) {
        self.short_press.clear();
        self.long_press.clear();
    }
}

impl Default for ButtonEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Observable classifier state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonState {
    /// Debounced up, raw input stable.
    Released,
    /// Raw input changed recently; the debounced state is unchanged.
    Debouncing,
    /// Debounced down, long press not yet reached.
    Held,
    /// Debounced down, long press already signaled this cycle.
    LongLatched,
}

/// Per-tick debounce and press classifier.
pub struct Debouncer {
    timing: ButtonTiming,
    raw_down: bool,
    debounced_down: bool,
    debounce_count: u32,
    hold_ticks: u32,
    long_press_signaled: bool,
}

impl Debouncer {
    /// Creates a classifier that starts released.
    ///
    /// # Arguments
    ///
    /// * `timing` - Debounce length and long-press threshold, in ticks
    pub const fn new(timing: ButtonTiming) -> Self {
        Self {
            timing,
            raw_down: false,
            debounced_down: false,
            debounce_count: timing.debounce_ticks,
            hold_ticks: 0,
            long_press_signaled: false,
        }
    }

    /// Feeds one raw sample. Call exactly once per tick.
    pub fn tick(&mut self, raw_down: bool, events: &ButtonEvents) {
        if raw_down != self.raw_down {
            self.debounce_count = self.timing.debounce_ticks;
        } else if self.debounce_count > 0 {
            self.debounce_count -= 1;
        }
        self.raw_down = raw_down;

        let was_down = self.debounced_down;
        if self.debounce_count == 0 {
            self.debounced_down = raw_down;
        }

        if self.debounced_down {
            self.hold_ticks = self.hold_ticks.saturating_add(1);
            if self.hold_ticks >= self.timing.long_press_ticks && !self.long_press_signaled {
                self.long_press_signaled = true;
                events.long_press.set();
                debug!("button: long press");
            }
        } else {
            if was_down && self.hold_ticks < self.timing.long_press_ticks {
                events.short_press.set();
                debug!("button: short press after {} ticks", self.hold_ticks);
            }
            self.hold_ticks = 0;
            self.long_press_signaled = false;
        }
    }

    /// Where the classifier is, derived from the raw and debounced levels.
    pub fn state(&self) -> ButtonState {
        if self.raw_down != self.debounced_down || self.debounce_count > 0 {
            ButtonState::Debouncing
        } else if !self.debounced_down {
            ButtonState::Released
        } else if self.long_press_signaled {
            ButtonState::LongLatched
        } else {
            ButtonState::Held
        }
    }

    /// Ticks the button has been debounced down this cycle.
    pub fn hold_ticks(&self) -> u32 {
        self.hold_ticks
    }

    /// The committed, debounced level.
    pub fn is_down(&self) -> bool {
        self.debounced_down
    }
}
