//! Chained sample playback.
//!
//! Playback is a three-stage pipeline clocked by the audio timer, one call
//! to [`Speaker::on_output_cycle`] per output cycle:
//!
//! - **stream**: moves the read cursor through the buffer one byte at a
//!   time into a holding slot;
//! - **trigger**: counts down `repetitions × len` output cycles, re-arming
//!   the output stage each cycle so every sample is held `repetitions`
//!   times;
//! - **output**: writes the held sample to the PWM compare level, then hands
//!   back to the stream stage for the next byte.
//!
//! When the trigger count runs out the completion handler decides what
//! happens next, in priority order: loop the same buffer, auto-chain from
//! the power-on sound into the hum loop, or silence the amplifier and
//! report done. The power-on → hum hand-off never passes through `done`.

use crate::assets::SoundBank;
use crate::fmt::{debug, trace};
use crate::random::{RandomSource, rand_pow2};
use crate::sync::Shared;

/// The analog side of the speaker.
pub trait AudioOutput {
    /// Sets the PWM compare level for the current output cycle.
    fn set_level(&mut self, level: u8);

    /// Switches the amplifier on or off.
    fn set_amplifier(&mut self, enabled: bool);
}

/// What the completion handler does when a buffer runs out.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackMode {
    /// Nothing armed.
    Idle,
    /// Play once, then report done.
    OneShot,
    /// Restart the same buffer forever.
    Loop,
    /// Play once, then switch to the hum loop without reporting done.
    AutoChaining,
}

/// Whether a play request repeats.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopMode {
    OneShot,
    Loop,
}

/// Armed pipeline state for one buffer.
struct Pipeline {
    buffer: &'static [u8],
    /// Stream stage read cursor.
    cursor: usize,
    /// Holding slot the output stage reads from.
    held: u8,
    /// Output cycles left for the held sample.
    hold_left: u32,
    /// Trigger stage transfers left.
    trigger_remaining: u32,
}

impl Pipeline {
    fn arm(buffer: &'static [u8], repetitions: u32) -> Self {
        let len = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        Self {
            buffer,
            cursor: 0,
            held: 0,
            hold_left: 0,
            trigger_remaining: len.saturating_mul(repetitions),
        }
    }

    fn exhausted(&self) -> bool {
        self.trigger_remaining == 0
    }
}

/// Playback engine.
pub struct Speaker<O> {
    output: O,
    sounds: &'static SoundBank,
    repetitions: u32,
    mode: PlaybackMode,
    pipeline: Option<Pipeline>,
    done: bool,
}

impl<O: AudioOutput> Speaker<O> {
    /// Creates an idle speaker with the amplifier off.
    pub fn new(mut output: O, sounds: &'static SoundBank, repetitions: u32) -> Self {
        output.set_amplifier(false);
        output.set_level(0);
        Self {
            output,
            sounds,
            repetitions: repetitions.max(1),
            mode: PlaybackMode::Idle,
            pipeline: None,
            done: true,
        }
    }

    /// Aborts anything in flight and starts `buffer`.
    pub fn play(&mut self, buffer: &'static [u8], loop_mode: LoopMode) {
        self.start(
            buffer,
            match loop_mode {
                LoopMode::OneShot => PlaybackMode::OneShot,
                LoopMode::Loop => PlaybackMode::Loop,
            },
        );
    }

    fn start(&mut self, buffer: &'static [u8], mode: PlaybackMode) {
        self.mode = mode;
        self.done = false;
        self.pipeline = Some(Pipeline::arm(buffer, self.repetitions));
        self.output.set_amplifier(true);
        trace!("speaker: play {} samples, {}", buffer.len(), mode);
    }

    /// Ignition sound, followed seamlessly by the hum loop.
    pub fn play_power_on(&mut self) {
        self.start(self.sounds.power_on, PlaybackMode::AutoChaining);
    }

    /// Extinguish sound, played once.
    pub fn play_power_off(&mut self) {
        self.play(self.sounds.power_off, LoopMode::OneShot);
    }

    /// Idle hum, looped until the next play or [`Speaker::stop`].
    pub fn play_hum(&mut self) {
        self.play(self.sounds.hum, LoopMode::Loop);
    }

    /// Plays one of the clash alternatives at random.
    pub fn play_clash<R: RandomSource + ?Sized>(&mut self, rng: &R) {
        let buffer = pick(self.sounds.clash, rng);
        self.play(buffer, LoopMode::OneShot);
    }

    /// Plays one of the swing alternatives at random.
    pub fn play_swing<R: RandomSource + ?Sized>(&mut self, rng: &R) {
        let buffer = pick(self.sounds.swing, rng);
        self.play(buffer, LoopMode::OneShot);
    }

    /// Stops playback and reports done immediately.
    ///
    /// The mode is cleared before the pipeline so a completion racing this
    /// call can only take the silence branch.
    pub fn stop(&mut self) {
        self.mode = PlaybackMode::Idle;
        self.pipeline = None;
        self.done = true;
        self.output.set_amplifier(false);
    }

    /// Switches the amplifier off without touching playback state.
    pub fn disable(&mut self) {
        self.output.set_amplifier(false);
    }

    /// True once nothing is queued and the output is silent.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// What the completion handler will do next.
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Advances the pipeline by one output cycle.
    pub fn on_output_cycle(&mut self) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };

        if !pipeline.exhausted() {
            pipeline.trigger_remaining -= 1;
            if pipeline.hold_left == 0 {
                pipeline.held = pipeline.buffer.get(pipeline.cursor).copied().unwrap_or(0);
                pipeline.cursor += 1;
                pipeline.hold_left = self.repetitions;
            }
            pipeline.hold_left -= 1;
            self.output.set_level(pipeline.held);
        }

        if pipeline.exhausted() {
            self.on_complete();
        }
    }

    /// Pipeline completion: loop, auto-chain, or finish.
    fn on_complete(&mut self) {
        match self.mode {
            PlaybackMode::Loop => {
                if let Some(pipeline) = self.pipeline.as_mut() {
                    *pipeline = Pipeline::arm(pipeline.buffer, self.repetitions);
                }
            }
            PlaybackMode::AutoChaining => {
                debug!("speaker: power-on finished, chaining into hum");
                self.mode = PlaybackMode::Loop;
                self.pipeline = Some(Pipeline::arm(self.sounds.hum, self.repetitions));
            }
            PlaybackMode::OneShot | PlaybackMode::Idle => {
                self.output.set_amplifier(false);
                self.pipeline = None;
                self.mode = PlaybackMode::Idle;
                self.done = true;
            }
        }
    }
}

fn pick<R: RandomSource + ?Sized>(choices: &'static [&'static [u8]], rng: &R) -> &'static [u8] {
    if choices.is_empty() {
        return &[];
    }
    let i = rand_pow2(rng, 8) as usize % choices.len();
    choices[i]
}

/// Busy-polls until `speaker` reports done. No timeout.
///
/// Only useful while something else, normally the audio interrupt, keeps
/// clocking the speaker. Returns at once if nothing is installed.
///
/// # Arguments
///
/// * `speaker` - The speaker shared with the output-cycle interrupt
pub fn wait_until_done<O: AudioOutput>(speaker: &Shared<Speaker<O>>) {
    while !speaker.lock(|s| s.is_done()).unwrap_or(true) {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::tests::ScriptedBits;

    #[derive(Default)]
    struct Recorder {
        levels: Vec<u8>,
        amplifier: bool,
    }

    impl AudioOutput for &mut Recorder {
        fn set_level(&mut self, level: u8) {
            self.levels.push(level);
        }

        fn set_amplifier(&mut self, enabled: bool) {
            self.amplifier = enabled;
        }
    }

    static ON: [u8; 3] = [1, 2, 3];
    static OFF: [u8; 2] = [9, 8];
    static HUM: [u8; 2] = [50, 60];
    static CLASH_A: [u8; 1] = [100];
    static CLASH_B: [u8; 1] = [200];

    static BANK: SoundBank = SoundBank {
        power_on: &ON,
        power_off: &OFF,
        hum: &HUM,
        clash: &[&CLASH_A, &CLASH_B],
        swing: &[&CLASH_B],
    };

    fn run(speaker: &mut Speaker<&mut Recorder>, cycles: usize) {
        for _ in 0..cycles {
            speaker.on_output_cycle();
        }
    }

    #[test]
    fn each_sample_is_held_for_repetitions() {
        let mut rec = Recorder::default();
        let mut speaker = Speaker::new(&mut rec, &BANK, 2);
        speaker.play_power_off();
        run(&mut speaker, 4);
        assert!(speaker.is_done());
        drop(speaker);
        assert_eq!(rec.levels, [0, 9, 9, 8, 8]);
        assert!(!rec.amplifier);
    }

    #[test]
    fn one_shot_reports_done_exactly_at_exhaustion() {
        let mut rec = Recorder::default();
        let mut speaker = Speaker::new(&mut rec, &BANK, 1);
        speaker.play(&OFF, LoopMode::OneShot);
        assert!(!speaker.is_done());
        run(&mut speaker, 1);
        assert!(!speaker.is_done());
        run(&mut speaker, 1);
        assert!(speaker.is_done());
        assert_eq!(speaker.mode(), PlaybackMode::Idle);
    }

    #[test]
    fn stop_before_completion_silences_and_reports_done() {
        let mut rec = Recorder::default();
        let mut speaker = Speaker::new(&mut rec, &BANK, 1);
        speaker.play(&OFF, LoopMode::OneShot);
        run(&mut speaker, 1);
        speaker.stop();
        assert!(speaker.is_done());
        run(&mut speaker, 10);
        drop(speaker);
        assert_eq!(rec.levels, [0, 9]);
        assert!(!rec.amplifier);
    }

    #[test]
    fn loop_never_reports_done_until_stopped() {
        let mut rec = Recorder::default();
        let mut speaker = Speaker::new(&mut rec, &BANK, 1);
        speaker.play_hum();
        for _ in 0..100 {
            speaker.on_output_cycle();
            assert!(!speaker.is_done());
        }
        speaker.stop();
        assert!(speaker.is_done());
        drop(speaker);
        assert_eq!(&rec.levels[1..7], [50, 60, 50, 60, 50, 60]);
    }

    #[test]
    fn power_on_chains_into_hum_without_done() {
        let mut rec = Recorder::default();
        let mut speaker = Speaker::new(&mut rec, &BANK, 1);
        speaker.play_power_on();
        assert_eq!(speaker.mode(), PlaybackMode::AutoChaining);
        for _ in 0..9 {
            speaker.on_output_cycle();
            assert!(!speaker.is_done());
        }
        assert_eq!(speaker.mode(), PlaybackMode::Loop);
        drop(speaker);
        assert_eq!(rec.levels, [0, 1, 2, 3, 50, 60, 50, 60, 50, 60]);
        assert!(rec.amplifier);
    }

    #[test]
    fn play_aborts_session_in_flight() {
        let mut rec = Recorder::default();
        let mut speaker = Speaker::new(&mut rec, &BANK, 1);
        speaker.play_power_on();
        run(&mut speaker, 1);
        speaker.play(&OFF, LoopMode::OneShot);
        run(&mut speaker, 2);
        assert!(speaker.is_done());
        drop(speaker);
        assert_eq!(rec.levels, [0, 1, 9, 8]);
    }

    #[test]
    fn clash_selection_uses_random_byte_modulo_count() {
        let mut rec = Recorder::default();
        let mut speaker = Speaker::new(&mut rec, &BANK, 1);
        // 0xFF % 2 == 1
        speaker.play_clash(&ScriptedBits::constant(true));
        run(&mut speaker, 1);
        // 0x00 % 2 == 0
        speaker.play_clash(&ScriptedBits::constant(false));
        run(&mut speaker, 1);
        drop(speaker);
        assert_eq!(rec.levels, [0, 200, 100]);
    }

    #[test]
    fn empty_buffer_completes_on_first_cycle() {
        static EMPTY: [u8; 0] = [];
        let mut rec = Recorder::default();
        let mut speaker = Speaker::new(&mut rec, &BANK, 2);
        speaker.play(&EMPTY, LoopMode::OneShot);
        run(&mut speaker, 1);
        assert!(speaker.is_done());
    }

    #[test]
    fn wait_until_done_returns_for_idle_speaker() {
        let mut rec = Recorder::default();
        let shared = Shared::new();
        shared.install(Speaker::new(&mut rec, &BANK, 1));
        wait_until_done(&shared);
    }

    #[test]
    fn wait_until_done_blocks_while_another_context_plays() {
        let mut rec = Recorder::default();
        let shared = Shared::new();
        shared.install(Speaker::new(&mut rec, &BANK, 2));
        shared.lock(|s| s.play_power_off());

        let cycles = std::thread::scope(|scope| {
            let clock = scope.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                let mut cycles = 0;
                while !shared.lock(|s| s.is_done()).unwrap_or(true) {
                    shared.lock(|s| s.on_output_cycle());
                    cycles += 1;
                }
                cycles
            });
            wait_until_done(&shared);
            assert_eq!(shared.lock(|s| s.is_done()), Some(true));
            clock.join().unwrap()
        });

        // Two samples held twice each.
        assert_eq!(cycles, 4);
        drop(shared);
        assert_eq!(rec.levels, [0, 9, 9, 8, 8]);
        assert!(!rec.amplifier);
    }
}
