//! Power-of-two random draws.
//!
//! Randomness is consumed one bit at a time, the way a ring-oscillator
//! random bit would be sampled. [`EntropyPool`] is the default source: a
//! xorshift32 generator that can be shared between interrupt and thread
//! context and is reseeded from the time base on every wake.

use portable_atomic::{AtomicU32, Ordering};

/// A source of single random bits.
///
/// Takes `&self` so one source can be shared by the tick handler and the
/// main loop.
pub trait RandomSource {
    /// Returns the next random bit.
    fn next_bit(&self) -> bool;
}

impl<R: RandomSource + ?Sized> RandomSource for &R {
    fn next_bit(&self) -> bool {
        (**self).next_bit()
    }
}

/// Draws `n_bits` random bits, most significant first.
pub fn rand_pow2<R: RandomSource + ?Sized>(source: &R, n_bits: u8) -> u32 {
    let mut r: u32 = 0;
    for _ in 0..n_bits {
        r = (r << 1) | u32::from(source.next_bit());
    }
    r
}

/// Draws `n_bits_max` random bits, then halves the result until it is no
/// larger than `n_bits_min`.
///
/// Despite the parameter names, `n_bits_min` acts as a value ceiling rather
/// than a bit count: `rand_pow2_range(src, 6, 12)` yields a value in `0..=6`
/// and `rand_pow2_range(src, 0, 12)` always yields 0. Callers depend on this
/// exact mapping.
pub fn rand_pow2_range<R: RandomSource + ?Sized>(source: &R, n_bits_min: u8, n_bits_max: u8) -> u32 {
    let mut r = rand_pow2(source, n_bits_max);
    while r > u32::from(n_bits_min) {
        r >>= 1;
    }
    r
}

/// Xorshift32 bit source with interrupt-safe state.
pub struct EntropyPool {
    state: AtomicU32,
}

impl EntropyPool {
    const FALLBACK_SEED: u32 = 0x9E37_79B9;

    /// Creates a pool from `seed`. A zero seed is replaced, since xorshift
    /// never leaves the all-zero state.
    pub const fn new(seed: u32) -> Self {
        Self {
            state: AtomicU32::new(if seed == 0 { Self::FALLBACK_SEED } else { seed }),
        }
    }

    /// Mixes `entropy` into the current state.
    pub fn reseed(&self, entropy: u32) {
        let _ = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
            let mixed = s ^ entropy.rotate_left(13);
            Some(if mixed == 0 { Self::FALLBACK_SEED } else { mixed })
        });
    }

    /// Advances the generator and returns the new 32-bit word.
    pub fn next_u32(&self) -> u32 {
        let step = |mut x: u32| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            x
        };
        match self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| Some(step(s)))
        {
            Ok(prev) | Err(prev) => step(prev),
        }
    }
}

impl RandomSource for EntropyPool {
    fn next_bit(&self) -> bool {
        self.next_u32() & 1 == 1
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use core::cell::Cell;

    use super::*;

    /// Replays a fixed bit pattern, repeating it when exhausted.
    pub(crate) struct ScriptedBits {
        bits: &'static [bool],
        pos: Cell<usize>,
    }

    impl ScriptedBits {
        pub(crate) fn new(bits: &'static [bool]) -> Self {
            Self {
                bits,
                pos: Cell::new(0),
            }
        }

        /// A source that always returns `bit`.
        pub(crate) fn constant(bit: bool) -> Self {
            Self::new(if bit { &[true] } else { &[false] })
        }
    }

    impl RandomSource for ScriptedBits {
        fn next_bit(&self) -> bool {
            let i = self.pos.get();
            self.pos.set(i + 1);
            self.bits[i % self.bits.len()]
        }
    }

    #[test]
    fn pow2_collects_bits_msb_first() {
        let src = ScriptedBits::new(&[true, false, true]);
        assert_eq!(rand_pow2(&src, 3), 0b101);
        assert_eq!(rand_pow2(&src, 0), 0);
    }

    #[test]
    fn pow2_of_eight_bits_is_full_byte() {
        let src = ScriptedBits::constant(true);
        assert_eq!(rand_pow2(&src, 8), 0xFF);
    }

    #[test]
    fn range_uses_first_argument_as_value_ceiling() {
        let ones = ScriptedBits::constant(true);
        // 0xFFF halves down to 3, which is <= 6.
        assert_eq!(rand_pow2_range(&ones, 6, 12), 3);
        // 0xFFFFFFFF (32 bits) halves down to 31, which is <= 32.
        assert_eq!(rand_pow2_range(&ones, 32, 32), 31);
        // 0xFFFFFFFF halves past 31 down to 15, which is <= 16.
        assert_eq!(rand_pow2_range(&ones, 16, 32), 15);
    }

    #[test]
    fn range_with_zero_ceiling_is_always_zero() {
        let ones = ScriptedBits::constant(true);
        assert_eq!(rand_pow2_range(&ones, 0, 12), 0);
        let mixed = ScriptedBits::new(&[false, true, true, false]);
        assert_eq!(rand_pow2_range(&mixed, 0, 12), 0);
    }

    #[test]
    fn range_can_return_zero_for_nonzero_ceiling() {
        let zeros = ScriptedBits::constant(false);
        assert_eq!(rand_pow2_range(&zeros, 6, 12), 0);
    }

    #[test]
    fn entropy_pool_never_sticks() {
        let pool = EntropyPool::new(0);
        let a = pool.next_u32();
        let b = pool.next_u32();
        assert_ne!(a, 0);
        assert_ne!(a, b);

        pool.reseed(0xDEAD_BEEF);
        let ones = (0..64).filter(|_| pool.next_bit()).count();
        assert!(ones > 0 && ones < 64);
    }
}
