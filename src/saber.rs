//! Control loop and power state machine.
//!
//! ```text
//!   cold boot ──▶ Dormant ──wake edge──▶ StartingUp ──settle──▶ Active
//!                    ▲                                            │
//!                    └──────────── ShuttingDown ◀── short press ──┘
//! ```
//!
//! The interrupt side (button tick, strip tick, audio cycle, motion edge)
//! runs independently and only talks to the loop through latches and the
//! two [`Shared`] cells. [`Board`] is everything else the loop needs from the
//! hardware.

use smart_leds::{RGB8, SmartLedsWrite};

use crate::audio::{AudioOutput, Speaker};
use crate::button::ButtonEvents;
use crate::config::SaberConfig;
use crate::fmt::{debug, info};
use crate::motion::MotionEvents;
use crate::random::RandomSource;
use crate::strip::Strip;
use crate::sync::Shared;

/// Where the saber is in its power cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Clocks up, blade igniting, ignition sound playing.
    StartingUp,
    /// Lit and reacting to the button and motion.
    Active,
    /// Blade retracting, waiting for sound and animation to finish.
    ShuttingDown,
    /// Halted until the next press.
    Dormant,
}

/// Hardware services the control loop drives directly.
#[allow(async_fn_in_trait)]
pub trait Board {
    /// Brings clocks back to full speed after dormancy.
    fn restore_clocks(&mut self);

    /// Quiesces everything and halts until the wake edge.
    async fn enter_dormant(&mut self);

    async fn delay_ms(&mut self, ms: u32);

    /// Gives the interrupt side a chance to run between loop iterations.
    async fn yield_now(&mut self);

    /// Takes the motion sensor out of its low-power sleep.
    async fn sensor_wake(&mut self);

    /// Puts the motion sensor to sleep.
    async fn sensor_sleep(&mut self);
}

/// The control loop.
///
/// `S` is the strip's random source, `R` the one used to pick sounds; on
/// the firmware both are the same entropy pool.
pub struct Saber<'a, B, O, W, S, R: ?Sized, const N: usize> {
    board: B,
    buttons: &'a ButtonEvents,
    motion: &'a MotionEvents,
    speaker: &'a Shared<Speaker<O>>,
    strip: &'a Shared<Strip<W, S, N>>,
    rng: &'a R,
    config: &'a SaberConfig,
    state: PowerState,
}

impl<'a, B, O, W, S, R, const N: usize> Saber<'a, B, O, W, S, R, N>
where
    B: Board,
    O: AudioOutput,
    W: SmartLedsWrite<Color = RGB8>,
    S: RandomSource,
    R: RandomSource + ?Sized,
{
    /// Creates the loop. Starts `Dormant`, or `StartingUp` when the
    /// configuration ignites on boot.
    pub fn new(
        board: B,
        buttons: &'a ButtonEvents,
        motion: &'a MotionEvents,
        speaker: &'a Shared<Speaker<O>>,
        strip: &'a Shared<Strip<W, S, N>>,
        rng: &'a R,
        config: &'a SaberConfig,
    ) -> Self {
        let state = if config.ignite_on_boot {
            PowerState::StartingUp
        } else {
            PowerState::Dormant
        };
        Self {
            board,
            buttons,
            motion,
            speaker,
            strip,
            rng,
            config,
            state,
        }
    }

    /// The state the next [`Saber::step`] will run.
    pub fn state(&self) -> PowerState {
        self.state
    }

    /// The board the loop drives.
    pub fn board(&self) -> &B {
        &self.board
    }

    /// Mutable access to the board, e.g. to feed it input.
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Runs the current state once and moves to the next.
    ///
    /// `Active` handles one round of events per call; every other state
    /// runs to completion.
    pub async fn step(&mut self) {
        let next = match self.state {
            PowerState::StartingUp => {
                self.start_up().await;
                PowerState::Active
            }
            PowerState::Active => self.poll_active().await,
            PowerState::ShuttingDown => {
                self.shut_down().await;
                PowerState::Dormant
            }
            PowerState::Dormant => {
                self.board.enter_dormant().await;
                PowerState::StartingUp
            }
        };
        if next != self.state {
            info!("saber: {} -> {}", self.state, next);
        }
        self.state = next;
    }

    /// Steps forever.
    pub async fn run(&mut self) -> ! {
        loop {
            self.step().await;
        }
    }

    async fn start_up(&mut self) {
        self.board.restore_clocks();

        let random_color = self.config.startup_color_random;
        self.strip.lock(|strip| {
            if random_color {
                strip.set_random_color();
            }
            strip.turn_on();
        });
        self.speaker.lock(|speaker| speaker.play_power_on());

        if self.config.sleep_sensor_when_off {
            self.board.sensor_wake().await;
        }

        // Ignition shakes the blade and bounces the button; drop whatever
        // that produced.
        self.board.delay_ms(self.config.power_on_settle_ms).await;
        self.buttons.clear();
        self.motion.clear();
    }

    async fn poll_active(&mut self) -> PowerState {
        let rng = self.rng;

        if self.motion.take_clash() {
            self.speaker.lock(|speaker| {
                speaker.stop();
                speaker.play_clash(rng);
            });
            if self.config.flash_on_clash {
                self.strip.lock(|strip| strip.flash());
            }
        }

        if self.motion.take_swing() {
            self.speaker.lock(|speaker| {
                speaker.stop();
                speaker.play_swing(rng);
            });
        }

        // Back to the hum once a motion sound has finished.
        self.speaker.lock(|speaker| {
            if speaker.is_done() {
                speaker.play_hum();
            }
        });

        if self.buttons.take_long() {
            debug!("saber: next color");
            self.strip.lock(|strip| strip.next_color());
        }

        if self.buttons.take_short() {
            return PowerState::ShuttingDown;
        }

        self.board.yield_now().await;
        PowerState::Active
    }

    async fn shut_down(&mut self) {
        self.speaker.lock(|speaker| {
            speaker.stop();
            speaker.play_power_off();
        });
        self.strip.lock(|strip| strip.turn_off());

        loop {
            let sound_done = self.speaker.lock(|speaker| speaker.is_done()).unwrap_or(true);
            let strip_dark = self.strip.lock(|strip| !strip.is_animating()).unwrap_or(true);
            if sound_done && strip_dark {
                break;
            }
            self.board.yield_now().await;
        }

        self.speaker.lock(|speaker| speaker.disable());
        if self.config.sleep_sensor_when_off {
            self.board.sensor_sleep().await;
        }
    }
}
