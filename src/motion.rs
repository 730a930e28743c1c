//! Clash / swing classification.
//!
//! The sensor pulls its interrupt line low when either of its motion
//! detectors fires. [`MotionEvents::on_interrupt`] reads the status
//! registers behind that edge and latches at most one event:
//!
//! - motion bit set: clash, regardless of anything else;
//! - otherwise zero-motion bit set: swing, but only if the sensor reports a
//!   transition *into* stillness rather than a continued still period.
//!
//! The status reads are bounded bus transfers. On the firmware they run in
//! a task woken by the edge rather than inside the interrupt itself.

use crate::config::MotionThresholds;
use crate::fmt::debug;
use crate::sync::EventLatch;

/// Interrupt status: motion detected.
pub const INT_MOTION: u8 = 1 << 6;
/// Interrupt status: zero-motion detected.
pub const INT_ZERO_MOTION: u8 = 1 << 5;
/// Motion detect status: set while still zero-motion, clear on entry.
pub const MOT_ZRMOT: u8 = 1 << 0;

/// Status register access needed to classify an interrupt.
pub trait MotionStatus {
    type Error;

    /// Reads (and thereby acknowledges) the interrupt status register.
    fn interrupt_status(&mut self) -> Result<u8, Self::Error>;

    /// Reads the motion detect status register.
    fn motion_detect_status(&mut self) -> Result<u8, Self::Error>;
}

/// Outcome of a sensor reset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetOutcome {
    /// The reset bit cleared within the poll budget.
    Complete,
    /// The poll budget ran out; the sensor may be misconfigured.
    TimedOut,
}

/// Power and threshold control of the motion sensor.
pub trait MotionSensor {
    type Error;

    /// Resets the device. Best effort: a timeout is reported, not fatal.
    fn reset(&mut self) -> Result<ResetOutcome, Self::Error>;

    /// Enters the sensor's low-power sleep.
    fn sleep(&mut self) -> Result<(), Self::Error>;

    /// Leaves sleep.
    fn wake(&mut self) -> Result<(), Self::Error>;

    /// Writes clash and swing thresholds and durations.
    fn configure_thresholds(&mut self, thresholds: MotionThresholds) -> Result<(), Self::Error>;
}

/// A classified motion event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Motion {
    Clash,
    Swing,
}

/// Clash and swing latches, consumed by the main loop.
pub struct MotionEvents {
    clash: EventLatch,
    swing: EventLatch,
}

impl MotionEvents {
    /// Creates the latches with nothing pending.
    pub const fn new() -> Self {
        Self {
            clash: EventLatch::new(),
            swing: EventLatch::new(),
        }
    }

    /// Classifies one sensor interrupt and latches the result.
    pub fn on_interrupt<S: MotionStatus>(&self, sensor: &mut S) -> Result<Option<Motion>, S::Error> {
        let status = sensor.interrupt_status()?;

        let motion = if status & INT_MOTION != 0 {
            self.clash.set();
            Some(Motion::Clash)
        } else if status & INT_ZERO_MOTION != 0 {
            let detect = sensor.motion_detect_status()?;
            if detect & MOT_ZRMOT == 0 {
                self.swing.set();
                Some(Motion::Swing)
            } else {
                None
            }
        } else {
            None
        };

        if let Some(m) = motion {
            debug!("motion: {}", m);
        }
        Ok(motion)
    }

    /// Consumes a pending clash.
    pub fn take_clash(&self) -> bool {
        self.clash.take()
    }

    /// Consumes a pending swing.
    pub fn take_swing(&self) -> bool {
        self.swing.take()
    }

    /// Discards both latches.
    pub fn clear(&self) {
        self.clash.clear();
        self.swing.clear();
    }
}

impl Default for MotionEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serves canned register values and counts reads.
    struct FakeStatus {
        int_status: u8,
        detect_status: u8,
        detect_reads: u32,
    }

    impl FakeStatus {
        fn new(int_status: u8, detect_status: u8) -> Self {
            Self {
                int_status,
                detect_status,
                detect_reads: 0,
            }
        }
    }

    impl MotionStatus for FakeStatus {
        type Error = ();

        fn interrupt_status(&mut self) -> Result<u8, ()> {
            Ok(self.int_status)
        }

        fn motion_detect_status(&mut self) -> Result<u8, ()> {
            self.detect_reads += 1;
            Ok(self.detect_status)
        }
    }

    #[test]
    fn motion_bit_is_a_clash() {
        let events = MotionEvents::new();
        let mut sensor = FakeStatus::new(INT_MOTION, 0);
        assert_eq!(events.on_interrupt(&mut sensor), Ok(Some(Motion::Clash)));
        assert!(events.take_clash());
        assert!(!events.take_swing());
        assert_eq!(sensor.detect_reads, 0);
    }

    #[test]
    fn clash_wins_when_both_bits_set() {
        let events = MotionEvents::new();
        let mut sensor = FakeStatus::new(INT_MOTION | INT_ZERO_MOTION, 0);
        assert_eq!(events.on_interrupt(&mut sensor), Ok(Some(Motion::Clash)));
        assert!(events.take_clash());
        assert!(!events.take_swing());
    }

    #[test]
    fn entering_stillness_is_a_swing() {
        let events = MotionEvents::new();
        let mut sensor = FakeStatus::new(INT_ZERO_MOTION, 0);
        assert_eq!(events.on_interrupt(&mut sensor), Ok(Some(Motion::Swing)));
        assert!(events.take_swing());
        assert!(!events.take_clash());
        assert_eq!(sensor.detect_reads, 1);
    }

    #[test]
    fn staying_still_is_ignored() {
        let events = MotionEvents::new();
        let mut sensor = FakeStatus::new(INT_ZERO_MOTION, MOT_ZRMOT);
        assert_eq!(events.on_interrupt(&mut sensor), Ok(None));
        assert!(!events.take_swing());
    }

    #[test]
    fn unrelated_status_is_ignored() {
        let events = MotionEvents::new();
        let mut sensor = FakeStatus::new(0x01, 0);
        assert_eq!(events.on_interrupt(&mut sensor), Ok(None));
        assert!(!events.take_clash());
        assert!(!events.take_swing());
    }

    #[test]
    fn latches_are_consumed_once_and_coalesce() {
        let events = MotionEvents::new();
        let mut sensor = FakeStatus::new(INT_MOTION, 0);
        events.on_interrupt(&mut sensor).ok();
        events.on_interrupt(&mut sensor).ok();
        assert!(events.take_clash());
        assert!(!events.take_clash());
    }

    #[test]
    fn clear_drops_both_kinds() {
        let events = MotionEvents::new();
        events.on_interrupt(&mut FakeStatus::new(INT_MOTION, 0)).ok();
        events.on_interrupt(&mut FakeStatus::new(INT_ZERO_MOTION, 0)).ok();
        events.clear();
        assert!(!events.take_clash());
        assert!(!events.take_swing());
    }
}
