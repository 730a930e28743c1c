//! Blade colors.
//!
//! Each entry pairs the steady idle color with the brighter color shown
//! during a clash flash. The last slot of the full palette is red, which is
//! also the only color of the single-color variant.

use smart_leds::RGB8;

/// Idle and flash colors for one palette slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PaletteEntry {
    /// Steady blade color.
    pub idle: RGB8,
    /// Higher-intensity color used while a flash phase is on.
    pub flash: RGB8,
}

const fn entry(idle: (u8, u8, u8), flash: (u8, u8, u8)) -> PaletteEntry {
    PaletteEntry {
        idle: RGB8 {
            r: idle.0,
            g: idle.1,
            b: idle.2,
        },
        flash: RGB8 {
            r: flash.0,
            g: flash.1,
            b: flash.2,
        },
    }
}

/// All pixels dark.
pub const OFF: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Blue, green, purple, teal, yellow, white, orange, pink, red.
pub const FULL: &[PaletteEntry] = &[
    entry((0x00, 0x00, 0x20), (0x20, 0x20, 0x60)),
    entry((0x00, 0x20, 0x00), (0x00, 0xa0, 0x00)),
    entry((0x10, 0x00, 0x10), (0x60, 0x20, 0x60)),
    entry((0x00, 0x10, 0x10), (0x20, 0x60, 0x60)),
    entry((0x20, 0x20, 0x00), (0x60, 0x60, 0x00)),
    entry((0x0d, 0x0d, 0x0d), (0x60, 0x60, 0x60)),
    entry((0x20, 0x08, 0x00), (0x60, 0x30, 0x10)),
    entry((0x20, 0x04, 0x04), (0x60, 0x10, 0x10)),
    entry((0x20, 0x00, 0x00), (0xa0, 0x00, 0x00)),
];

/// Red only.
pub const SINGLE: &[PaletteEntry] = &[entry((0x20, 0x00, 0x00), (0xa0, 0x00, 0x00))];
