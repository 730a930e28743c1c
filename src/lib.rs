//! Hardware-independent core of the saber firmware.
//!
//! Everything here runs unchanged on the target and on the host. The
//! firmware binary (`src/main.rs`, feature `firmware`) supplies the
//! peripherals: a PWM [`audio::AudioOutput`], a
//! [`smart_leds::SmartLedsWrite`] strip, an I2C bus for the
//! [`mpu6050::Mpu6050`] and a [`saber::Board`].
//!
//! # Module Organization
//!
//! - [`button`], [`motion`] - input classification into latched events
//! - [`audio`], [`assets`] - sample playback and the built-in sound banks
//! - [`strip`], [`palette`] - blade animation
//! - [`ws2812`] - frame hand-off and wire encoding for the blade
//! - [`saber`] - control loop and power states
//! - [`config`] - build-time product variants
//! - [`sync`], [`random`] - shared primitives

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod assets;
pub mod audio;
pub mod button;
pub mod config;
pub mod motion;
pub mod mpu6050;
pub mod palette;
pub mod random;
pub mod saber;
pub mod strip;
pub mod sync;
pub mod ws2812;
