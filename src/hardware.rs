//! Hardware abstraction and peripheral initialization.
//!
//! This module defines the pin mappings and peripheral bring-up for the
//! saber hilt board, and the two output adapters the core library drives:
//! [`PwmAudio`] for the speaker and [`SpiStrip`], which pushes finished
//! frames to the blade.
//!
//! # Pin Assignments
//!
//! ## User Input
//! - **PA0**: BUTTON_N - Active-low momentary button, internal pull-up.
//!   Also the only wake source from STOP mode.
//!
//! ## Audio
//! - **PA5**: AUDIO_PWM - TIM2_CH1, 62.5 kHz carrier, 8-bit duty
//! - **PB0**: AMP_EN - Class-D amplifier shutdown, active high
//!
//! ## Blade
//! - **PA7**: LED_DIN - SPI1_MOSI, WS2812 data (4 SPI bits per LED bit)
//!
//! ## Motion Sensor (MPU-6050)
//! - **PB6**: I2C1_SCL
//! - **PB7**: I2C1_SDA
//! - **PA1**: IMU_INT_N - Latched, active-low interrupt
//!
//! ## Debug (SWD)
//! - **PA13**: SWDIO
//! - **PA14**: SWCLK

use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, OutputType, Pull, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::mode::Blocking;
use embassy_stm32::peripherals::TIM2;
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_time::Delay;
use heapless::Vec;
use saber::audio::AudioOutput;
use saber::config::LED_COUNT;
use saber::mpu6050::Mpu6050;
use saber::ws2812::{FrameOverflow, encode_frame, frame_bytes};
use smart_leds::RGB8;

/// PWM carrier. 16 MHz / 62.5 kHz gives a 256-step period.
const PWM_CARRIER: Hertz = Hertz(62_500);

/// SPI clock for the strip: 250 ns per SPI bit.
const STRIP_SPI_CLOCK: Hertz = Hertz::mhz(4);

/// MPU-6050 on the blocking I2C bus.
pub type Imu = Mpu6050<I2c<'static, Blocking>, Delay>;

/// Speaker output: PWM compare level plus amplifier enable.
pub struct PwmAudio {
    pwm: SimplePwm<'static, TIM2>,
    amp_enable: Output<'static>,
}

impl PwmAudio {
    fn new(mut pwm: SimplePwm<'static, TIM2>, amp_enable: Output<'static>) -> Self {
        pwm.ch1().set_duty_cycle(0);
        pwm.ch1().enable();
        Self { pwm, amp_enable }
    }
}

impl AudioOutput for PwmAudio {
    fn set_level(&mut self, level: u8) {
        self.pwm.ch1().set_duty_cycle(u16::from(level));
    }

    fn set_amplifier(&mut self, enabled: bool) {
        if enabled {
            self.amp_enable.set_high();
        } else {
            self.amp_enable.set_low();
        }
    }
}

/// Failure pushing a frame to the strip.
#[derive(Debug, defmt::Format)]
pub enum StripError {
    /// More pixels than the frame buffer holds.
    Overflow(FrameOverflow),
    Spi(spi::Error),
}

/// WS2812 chain driven from the SPI MOSI line.
///
/// Only the strip task pushes frames, in thread mode, so the audio and tick
/// interrupts preempt the transfer instead of waiting behind it.
pub struct SpiStrip {
    spi: Spi<'static, Blocking>,
    frame: Vec<u8, { frame_bytes(LED_COUNT) }>,
}

impl SpiStrip {
    fn new(spi: Spi<'static, Blocking>) -> Self {
        Self {
            spi,
            frame: Vec::new(),
        }
    }

    /// Encodes and clocks out one frame.
    ///
    /// # Arguments
    ///
    /// * `pixels` - Colors in blade order, hilt first
    pub fn push(&mut self, pixels: &[RGB8]) -> Result<(), StripError> {
        encode_frame(pixels, &mut self.frame).map_err(StripError::Overflow)?;
        self.spi
            .blocking_write(self.frame.as_slice())
            .map_err(StripError::Spi)
    }
}

/// Top-level peripheral container for the saber.
///
/// Everything here is handed off during start-up: the outputs into the
/// interrupt-shared speaker and strip, the sensor behind a mutex, and the
/// two edge inputs to their tasks.
pub struct Peripherals {
    /// PWM speaker output (TIM2_CH1 + AMP_EN)
    pub audio: PwmAudio,
    /// WS2812 blade on SPI1
    pub strip: SpiStrip,
    /// Motion sensor on I2C1
    pub imu: Imu,
    /// IMU interrupt line (falling edge = new event)
    pub imu_int: ExtiInput<'static>,
    /// Button, used by the board as the wake edge
    pub button: ExtiInput<'static>,
}

impl Peripherals {
    /// Initializes all peripherals from the STM32 peripheral singleton.
    ///
    /// # Initial States
    ///
    /// - PB0 (AMP_EN): Low (amplifier off)
    /// - PA5 (AUDIO_PWM): 0 % duty
    /// - PA7 (LED_DIN): idle low
    /// - PA0, PA1: inputs with pull-up
    pub fn new(p: embassy_stm32::Peripherals) -> Self {
        let pwm = SimplePwm::new(
            p.TIM2,
            Some(PwmPin::new(p.PA5, OutputType::PushPull)),
            None,
            None,
            None,
            PWM_CARRIER,
            CountingMode::EdgeAlignedUp,
        );

        let mut spi_config = spi::Config::default();
        spi_config.frequency = STRIP_SPI_CLOCK;

        let mut i2c_config = i2c::Config::default();
        i2c_config.frequency = Hertz::khz(400);

        Self {
            audio: PwmAudio::new(pwm, Output::new(p.PB0, Level::Low, Speed::Low)),
            strip: SpiStrip::new(Spi::new_blocking_txonly_nosck(p.SPI1, p.PA7, spi_config)),
            imu: Mpu6050::new(I2c::new_blocking(p.I2C1, p.PB6, p.PB7, i2c_config), Delay),
            imu_int: ExtiInput::new(p.PA1, p.EXTI1, Pull::Up),
            button: ExtiInput::new(p.PA0, p.EXTI0, Pull::Up),
        }
    }
}
