//! Firmware for a motion-reactive lightsaber hilt.
//!
//! # Overview
//!
//! A single button ignites and extinguishes the blade. While lit, the hilt
//! hums; swinging it plays a swing sound and striking something plays a
//! clash (optionally flashing the blade). A long press cycles the blade
//! color. Between uses the MCU sits in STOP mode until the next press.
//!
//! # Hardware
//!
//! - **MCU**: STM32L072CZ (Cortex-M0+), 16 MHz HSI
//! - **Blade**: 25 WS2812 pixels on SPI1 MOSI
//! - **Audio**: 8-bit PWM on TIM2_CH1 into a class-D amplifier
//! - **Motion**: MPU-6050 on I2C1 with a latched interrupt line
//!
//! # Interrupt Side
//!
//! - TIM21 (31.25 kHz) clocks the speaker pipeline
//! - TIM22 (1 kHz) runs the button debouncer and blade animation
//! - [`strip_task`] pushes each finished blade frame over SPI
//! - [`motion_task`] classifies each sensor interrupt into clash or swing
//!
//! All of them communicate with the control loop through the statics
//! below.
//!
//! # Module Organization
//!
//! - [`power`] - Timers, their interrupts, and STOP-mode dormancy
//! - [`hardware`] - Pin mappings and peripheral initialization

#![no_std]
#![no_main]

mod hardware;
mod power;

use embassy_executor::Spawner;
use embassy_stm32::Config;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::rcc::{Sysclk, VoltageScale};
use embassy_time::Timer;
use saber::audio::Speaker;
use saber::button::{ButtonEvents, Debouncer};
use saber::config::{CONFIG, LED_COUNT};
use saber::motion::{MotionEvents, MotionSensor, ResetOutcome};
use saber::random::EntropyPool;
use saber::saber::Saber;
use saber::strip::Strip;
use saber::sync::Shared;
use saber::ws2812::{FrameSender, FrameSignal};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use hardware::{Peripherals, PwmAudio, SpiStrip};
use power::{ImuMutex, SaberBoard, setup_timers};

/// Core and timer clock.
const SYSCLK_HZ: u32 = 16_000_000;

/// Back-off after a failed status read, while the line is still low.
const MOTION_RETRY_MS: u64 = 5;

/// Blade animator as installed in [`STRIP`].
pub type BladeStrip = Strip<FrameSender<'static, LED_COUNT>, &'static EntropyPool, LED_COUNT>;

/// Short and long press latches, set by the tick interrupt.
pub static BUTTONS: ButtonEvents = ButtonEvents::new();
/// Clash and swing latches, set by [`motion_task`].
pub static MOTION: MotionEvents = MotionEvents::new();
/// Random bits for sound choice, colors and flashes.
pub static ENTROPY: EntropyPool = EntropyPool::new(0x5eed_b1ad);

/// Button classifier, ticked by TIM22.
pub static DEBOUNCER: Shared<Debouncer> = Shared::new();
/// Speaker pipeline, clocked by TIM21 and started by the control loop.
pub static SPEAKER: Shared<Speaker<PwmAudio>> = Shared::new();
/// Blade animator, ticked by TIM22 and started by the control loop.
pub static STRIP: Shared<BladeStrip> = Shared::new();
/// Newest blade frame, posted by the tick interrupt for [`strip_task`].
pub static FRAMES: FrameSignal<LED_COUNT> = FrameSignal::new();

static IMU: StaticCell<ImuMutex> = StaticCell::new();

/// Creates the clock configuration: HSI16 straight to SYSCLK, no PLL.
///
/// The same clock is selected as the STOP wake-up clock, so nothing has to
/// be restored after dormancy. `debug-mode` builds never enter STOP (see
/// `power::arm_stop_mode`), so HSI16 also runs while dormant.
fn create_clock_config() -> embassy_stm32::rcc::Config {
    let mut rcc = embassy_stm32::rcc::Config::default();
    rcc.hsi = true;
    rcc.msi = None;
    rcc.pll = None;
    rcc.sys = Sysclk::HSI;
    rcc.voltage_scale = VoltageScale::RANGE1;
    rcc
}

/// Classifies sensor interrupts into the motion latches.
///
/// The line is latched low until the status register is read, so waiting
/// for a low level rather than an edge cannot miss an event.
#[embassy_executor::task]
async fn motion_task(mut int: ExtiInput<'static>, imu: &'static ImuMutex) {
    loop {
        int.wait_for_low().await;
        let result = MOTION.on_interrupt(&mut *imu.lock().await);
        if let Err(e) = result {
            defmt::warn!("imu: status read failed: {}", e);
            Timer::after_millis(MOTION_RETRY_MS).await;
        }
    }
}

/// Pushes blade frames to the LEDs.
///
/// Runs in thread mode so the transfer never holds off the audio interrupt.
/// Frames posted while a push is in flight collapse into the newest.
#[embassy_executor::task]
async fn strip_task(mut strip: SpiStrip) {
    loop {
        let frame = FRAMES.wait().await;
        if let Err(e) = strip.push(&frame) {
            defmt::warn!("strip: push failed: {}", e);
        }
    }
}

/// Main entry point for the saber firmware.
///
/// # Initialization Sequence
///
/// 1. Configure clocks (16 MHz HSI)
/// 2. Initialize STM32 peripherals
/// 3. Reset and configure the motion sensor, then put it to sleep
/// 4. Hand the speaker, strip and debouncer to the interrupt side
/// 5. Configure the audio and tick timers
/// 6. Spawn the motion and strip tasks
/// 7. Run the control loop, which starts dormant
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let mut config = Config::default();
    config.rcc = create_clock_config();

    let p = embassy_stm32::init(config);

    #[cfg(feature = "debug-mode")]
    defmt::info!("Saber firmware starting...");

    let mut peripherals = Peripherals::new(p);

    #[cfg(feature = "debug-mode")]
    defmt::info!("Configuring motion sensor...");

    match peripherals.imu.reset() {
        Ok(ResetOutcome::Complete) => {}
        Ok(ResetOutcome::TimedOut) => defmt::warn!("imu: reset timed out, continuing"),
        Err(e) => defmt::warn!("imu: reset failed: {}", e),
    }
    if let Err(e) = peripherals.imu.configure_interrupt(CONFIG.motion) {
        defmt::warn!("imu: interrupt setup failed: {}", e);
    }
    if CONFIG.sleep_sensor_when_off {
        if let Err(e) = peripherals.imu.sleep() {
            defmt::warn!("imu: sleep failed: {}", e);
        }
    }

    #[cfg(feature = "debug-mode")]
    defmt::info!("Installing audio and blade...");

    SPEAKER.install(Speaker::new(
        peripherals.audio,
        CONFIG.sounds,
        CONFIG.audio.repetitions,
    ));
    STRIP.install(Strip::new(
        FrameSender::new(&FRAMES),
        &ENTROPY,
        CONFIG.palette,
        CONFIG.strip,
        CONFIG.flash,
    ));
    DEBOUNCER.install(Debouncer::new(CONFIG.button));

    setup_timers(SYSCLK_HZ, CONFIG.audio.output_cycle_hz());

    #[cfg(feature = "debug-mode")]
    defmt::info!("Spawning tasks...");

    spawner.spawn(strip_task(peripherals.strip)).unwrap();
    let imu: &'static ImuMutex = IMU.init(ImuMutex::new(peripherals.imu));
    spawner.spawn(motion_task(peripherals.imu_int, imu)).unwrap();

    #[cfg(feature = "debug-mode")]
    defmt::info!("Entering control loop...");

    let mut saber = Saber::new(
        SaberBoard::new(peripherals.button, imu),
        &BUTTONS,
        &MOTION,
        &SPEAKER,
        &STRIP,
        &ENTROPY,
        &CONFIG,
    );
    saber.run().await
}
