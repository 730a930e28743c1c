//! Build-time configuration.
//!
//! Every product variant is resolved here once, from Cargo features, into a
//! single [`SaberConfig`] value. The rest of the crate reads fields from the
//! config it was constructed with and never checks features itself.

use crate::assets::{self, SoundBank};
use crate::palette::{self, PaletteEntry};

/// Number of LEDs in the blade strip.
pub const LED_COUNT: usize = 25;

/// Button timing, in ticks of the 1 ms time base.
#[derive(Clone, Copy, Debug)]
pub struct ButtonTiming {
    /// Consecutive identical raw samples required before a state change is
    /// committed.
    pub debounce_ticks: u32,
    /// Hold length at which a press becomes a long press.
    pub long_press_ticks: u32,
}

/// Strip animation timing.
#[derive(Clone, Copy, Debug)]
pub struct StripTiming {
    /// Ticks between lighting successive LEDs while turning on.
    pub turn_on_ms_per_led: u32,
    /// Ticks between darkening successive LEDs while turning off.
    pub turn_off_ms_per_led: u32,
}

/// Arguments for the random draws that shape a clash flash.
///
/// Values are passed straight to [`crate::random::rand_pow2_range`].
#[derive(Clone, Copy, Debug)]
pub struct FlashTiming {
    /// Bit count for the flash count draw.
    pub count_bits: u8,
    /// `(min, max)` for the duration of each bright phase.
    pub on_range: (u8, u8),
    /// `(min, max)` for the gap between bright phases.
    pub off_range: (u8, u8),
}

/// Motion interrupt thresholds, written verbatim to the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionThresholds {
    /// Motion threshold in sensor-native counts.
    pub clash_threshold: u8,
    /// Motion duration in ms.
    pub clash_duration: u8,
    /// Zero-motion threshold in sensor-native counts.
    pub swing_threshold: u8,
    /// Zero-motion duration in units of 64 ms.
    pub swing_duration: u8,
}

/// Audio clocking.
#[derive(Clone, Copy, Debug)]
pub struct AudioTiming {
    /// Sample rate of the sound bank.
    pub sample_rate_hz: u32,
    /// Output cycles each sample is held for.
    pub repetitions: u32,
}

impl AudioTiming {
    /// Rate at which the output stage must be clocked.
    pub const fn output_cycle_hz(&self) -> u32 {
        self.sample_rate_hz * self.repetitions
    }
}

/// Complete product configuration.
#[derive(Clone, Copy)]
pub struct SaberConfig {
    /// Blade colors. A single-entry palette disables color cycling.
    pub palette: &'static [PaletteEntry],
    /// Pick a random idle color on every ignition.
    pub startup_color_random: bool,
    /// Run the flash sequence on a clash.
    pub flash_on_clash: bool,
    /// Put the motion sensor to sleep while dormant.
    pub sleep_sensor_when_off: bool,
    /// Ignite straight from a cold boot instead of waiting dormant.
    pub ignite_on_boot: bool,
    /// Enter STOP while dormant. Off in `debug-mode`, where the core only
    /// sleeps so the debug clock and SWD link stay up.
    pub deep_sleep_when_dormant: bool,
    /// Delay after ignition during which events are discarded.
    pub power_on_settle_ms: u32,
    pub button: ButtonTiming,
    pub strip: StripTiming,
    pub flash: FlashTiming,
    pub motion: MotionThresholds,
    pub audio: AudioTiming,
    pub sounds: &'static SoundBank,
}

impl SaberConfig {
    /// The configuration selected by the enabled Cargo features.
    pub const fn from_features() -> Self {
        let single = cfg!(feature = "single-color");
        Self {
            palette: if single { palette::SINGLE } else { palette::FULL },
            startup_color_random: cfg!(feature = "startup-color-random") && !single,
            flash_on_clash: cfg!(feature = "flash-on-clash"),
            sleep_sensor_when_off: true,
            ignite_on_boot: cfg!(feature = "ignite-on-boot"),
            deep_sleep_when_dormant: !cfg!(feature = "debug-mode"),
            power_on_settle_ms: 1600,
            button: ButtonTiming {
                debounce_ticks: 10,
                long_press_ticks: 1000,
            },
            strip: StripTiming {
                turn_on_ms_per_led: 30,
                turn_off_ms_per_led: 30,
            },
            flash: FlashTiming {
                count_bits: 12,
                on_range: (6, 12),
                off_range: (16, 32),
            },
            motion: MotionThresholds {
                clash_threshold: 48,
                clash_duration: 20,
                swing_threshold: 144,
                swing_duration: 8,
            },
            audio: AudioTiming {
                sample_rate_hz: 15_625,
                repetitions: 2,
            },
            sounds: if cfg!(feature = "dark-tunes") {
                &assets::DARK
            } else {
                &assets::STANDARD
            },
        }
    }

    /// Whether the long-press color change does anything.
    pub const fn cycles_colors(&self) -> bool {
        self.palette.len() > 1
    }
}

/// The configuration this image was built with.
pub const CONFIG: SaberConfig = SaberConfig::from_features();
