//! WS2812 frame hand-off and SPI encoding.
//!
//! The strip animates from the 1 ms tick interrupt, but pushing a frame
//! down the wire takes far longer than an audio output cycle. So the
//! animator writes into a [`FrameSender`], which only copies the pixels into
//! a [`FrameSignal`]. A lower-priority task waits on the signal, encodes
//! the newest frame with [`encode_frame`] and clocks it out with interrupts
//! enabled. Frames produced faster than they are pushed collapse into the
//! latest one.
//!
//! # Wire encoding
//!
//! Each LED bit becomes one SPI nibble, `1000` for a zero and `1110` for a
//! one, so at a 4 MHz SPI clock a zero is 250 ns high and a one 750 ns.
//! Bytes go out green, red, blue, followed by a run of zero bytes that
//! latches the frame.

use core::convert::Infallible;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use heapless::Vec;
use smart_leds::{RGB8, SmartLedsWrite};

use crate::palette::OFF;

/// Zero bytes after a frame (> 50 µs low at 4 MHz).
pub const RESET_BYTES: usize = 32;

/// Encoded size of an `n`-pixel frame including the latch gap.
pub const fn frame_bytes(n: usize) -> usize {
    n * 12 + RESET_BYTES
}

/// Latest frame waiting to be pushed.
pub type FrameSignal<const N: usize> = Signal<CriticalSectionRawMutex, [RGB8; N]>;

/// The encoded frame did not fit the output buffer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameOverflow;

/// [`SmartLedsWrite`] that hands frames to the push task.
///
/// Pixels past `N` are dropped; missing pixels are dark.
pub struct FrameSender<'a, const N: usize> {
    frames: &'a FrameSignal<N>,
}

impl<'a, const N: usize> FrameSender<'a, N> {
    /// Creates a sender that posts into `frames`.
    pub const fn new(frames: &'a FrameSignal<N>) -> Self {
        Self { frames }
    }
}

impl<const N: usize> SmartLedsWrite for FrameSender<'_, N> {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Infallible>
    where
        T: IntoIterator<Item = I>,
        I: Into<RGB8>,
    {
        let mut frame = [OFF; N];
        for (slot, pixel) in frame.iter_mut().zip(iterator) {
            *slot = pixel.into();
        }
        self.frames.signal(frame);
        Ok(())
    }
}

const fn nibble(bit: u8) -> u8 {
    if bit & 1 == 1 { 0b1110 } else { 0b1000 }
}

/// Encodes `pixels` for the SPI line into `out`, replacing its contents.
pub fn encode_frame<const CAP: usize>(
    pixels: &[RGB8],
    out: &mut Vec<u8, CAP>,
) -> Result<(), FrameOverflow> {
    out.clear();
    for pixel in pixels {
        for byte in [pixel.g, pixel.r, pixel.b] {
            for shift in [6, 4, 2, 0] {
                let encoded = (nibble(byte >> (shift + 1)) << 4) | nibble(byte >> shift);
                out.push(encoded).map_err(|_| FrameOverflow)?;
            }
        }
    }
    for _ in 0..RESET_BYTES {
        out.push(0).map_err(|_| FrameOverflow)?;
    }
    Ok(())
}
