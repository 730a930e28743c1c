//! Sound banks.
//!
//! Samples are raw unsigned 8-bit amplitudes centred on 128 at the rate
//! given by [`crate::config::AudioTiming`]. The tables here are synthesized
//! at compile time so the image builds without external recordings; a
//! converted recording can replace any of them as long as it stays a
//! `&'static [u8]`.

/// The set of sounds one build plays.
pub struct SoundBank {
    /// Ignition; auto-chains into [`SoundBank::hum`].
    pub power_on: &'static [u8],
    /// Retraction.
    pub power_off: &'static [u8],
    /// Idle loop.
    pub hum: &'static [u8],
    /// Alternatives for a clash, picked at random.
    pub clash: &'static [&'static [u8]],
    /// Alternatives for a swing, picked at random.
    pub swing: &'static [&'static [u8]],
}

/// Triangle wave with the given period and peak deviation from mid-scale.
const fn triangle<const N: usize>(period: usize, depth: u8) -> [u8; N] {
    let mut out = [128u8; N];
    let half = period / 2;
    let mut i = 0;
    while i < N {
        let phase = i % period;
        let ramp = if phase < half { phase } else { period - phase };
        let dev = (ramp * 4 * depth as usize) / period;
        out[i] = 128 - depth + dev as u8;
        i += 1;
    }
    out
}

/// Triangle wave whose period glides from `start` to `end` samples while
/// the depth follows an attack/decay envelope.
const fn glide<const N: usize>(start: usize, end: usize, depth: u8) -> [u8; N] {
    let mut out = [128u8; N];
    let mut i = 0;
    let mut phase = 0;
    while i < N {
        let period = if end >= start {
            start + (end - start) * i / N
        } else {
            start - (start - end) * i / N
        };
        if phase >= period {
            phase = 0;
        }
        let envelope = if i < N / 8 {
            i * 8 / (N / 8 + 1)
        } else {
            (N - i) * 8 / N
        };
        let d = depth as usize * envelope / 8;
        let half = period / 2;
        let ramp = if phase < half { phase } else { period - phase };
        let dev = ramp * 4 * d / period;
        out[i] = (128 - d + dev) as u8;
        phase += 1;
        i += 1;
    }
    out
}

static POWER_ON: [u8; 4096] = glide(120, 56, 96);
static POWER_OFF: [u8; 4096] = glide(56, 140, 96);
static HUM: [u8; 1024] = triangle(128, 40);
static CLASH_0: [u8; 1536] = glide(18, 40, 120);
static CLASH_1: [u8; 1536] = glide(24, 52, 120);
static SWING_0: [u8; 2048] = glide(90, 60, 80);
static SWING_1: [u8; 2048] = glide(70, 100, 80);

static DARK_POWER_ON: [u8; 6144] = glide(200, 90, 100);
static DARK_POWER_OFF: [u8; 6144] = glide(90, 220, 100);
static DARK_HUM: [u8; 1024] = triangle(256, 48);
static DARK_CLASH_0: [u8; 1536] = glide(30, 64, 124);
static DARK_SWING_0: [u8; 2048] = glide(150, 100, 90);

/// Bright ignition with two clash and two swing variants.
pub static STANDARD: SoundBank = SoundBank {
    power_on: &POWER_ON,
    power_off: &POWER_OFF,
    hum: &HUM,
    clash: &[&CLASH_0, &CLASH_1],
    swing: &[&SWING_0, &SWING_1],
};

/// Lower, slower set with one clash and one swing.
pub static DARK: SoundBank = SoundBank {
    power_on: &DARK_POWER_ON,
    power_off: &DARK_POWER_OFF,
    hum: &DARK_HUM,
    clash: &[&DARK_CLASH_0],
    swing: &[&DARK_SWING_0],
};
