//! Time base, audio clock and STOP-mode dormancy.
//!
//! Two basic timers drive the interrupt side of the firmware:
//!
//! - **TIM21** at the audio output-cycle rate (31.25 kHz) feeds one sample
//!   slot to the speaker per update event. Highest priority: a late update
//!   is an audible click.
//! - **TIM22** at 1 kHz samples the button and advances the blade
//!   animation.
//!
//! Both run off the 16 MHz HSI and are configured through the PAC, since
//! neither needs anything from the HAL beyond an update interrupt.
//!
//! # Dormancy
//!
//! While dormant both timers are stopped, SLEEPDEEP is set and the executor
//! idles into STOP mode (plain SLEEP in `debug-mode`). The only armed wake source is the button's EXTI
//! line. STOPWUCK selects HSI16 as the wake-up clock, so the core resumes at
//! full speed without reprogramming the RCC.

use embassy_stm32::exti::ExtiInput;
use embassy_stm32::interrupt::{InterruptExt, Priority, TIM21 as AUDIO_IRQ, TIM22 as TICK_IRQ};
use embassy_stm32::pac;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Instant, Timer};
use pac::interrupt;
use saber::config::CONFIG;
use saber::motion::MotionSensor;
use saber::saber::Board;

use crate::hardware::Imu;
use crate::{BUTTONS, DEBOUNCER, ENTROPY, SPEAKER, STRIP};

/// GPIOA line the button sits on.
const BUTTON_PIN: usize = 0;

/// Rate of the button and strip tick.
const TICK_HZ: u32 = 1_000;

/// Motion sensor shared by the motion task and the board.
pub type ImuMutex = Mutex<CriticalSectionRawMutex, Imu>;

/// Audio output-cycle interrupt.
///
/// Clears the update flag and clocks the speaker pipeline once.
#[interrupt]
fn TIM21() {
    pac::TIM21.sr().modify(|w| w.set_uif(false));
    SPEAKER.lock(|speaker| speaker.on_output_cycle());
}

/// 1 ms tick interrupt.
///
/// Reads the raw button level straight from the input data register
/// (active low) and runs the debouncer and the strip animation. The strip
/// only posts its frame here; `strip_task` does the SPI transfer.
#[interrupt]
fn TIM22() {
    pac::TIM22.sr().modify(|w| w.set_uif(false));

    let raw_down = pac::GPIOA.idr().read().idr(BUTTON_PIN) == pac::gpio::vals::Idr::LOW;
    DEBOUNCER.lock(|debouncer| debouncer.tick(raw_down, &BUTTONS));
    STRIP.lock(|strip| strip.tick());
}

/// Programs one update-only timer for `rate_hz`.
fn configure_timer(tim: pac::timer::TimGp16, clock_hz: u32, rate_hz: u32) {
    let ticks = clock_hz / rate_hz;
    let psc = (ticks - 1) / 0x1_0000;
    let arr = ticks / (psc + 1) - 1;

    tim.cr1().modify(|w| w.set_cen(false));
    tim.psc().write_value(psc as u16);
    tim.arr().write(|w| w.set_arr(arr as u16));
    // Load the prescaler now rather than at the first overflow.
    tim.egr().write(|w| w.set_ug(true));
    tim.sr().modify(|w| w.set_uif(false));
    tim.dier().modify(|w| w.set_uie(true));
}

/// Configures TIM21 and TIM22 and their interrupt priorities.
///
/// The timers stay stopped until [`start_timers`].
pub fn setup_timers(clock_hz: u32, output_cycle_hz: u32) {
    pac::RCC.apb2enr().modify(|w| {
        w.set_tim21en(true);
        w.set_tim22en(true);
    });

    configure_timer(pac::TIM21, clock_hz, output_cycle_hz);
    configure_timer(pac::TIM22, clock_hz, TICK_HZ);

    AUDIO_IRQ.set_priority(Priority::P0);
    TICK_IRQ.set_priority(Priority::P1);
}

/// Starts both timers and unmasks their interrupts.
pub fn start_timers() {
    pac::TIM21.cr1().modify(|w| w.set_cen(true));
    pac::TIM22.cr1().modify(|w| w.set_cen(true));

    unsafe {
        AUDIO_IRQ.enable();
        TICK_IRQ.enable();
    }
}

/// Stops both timers and masks their interrupts.
fn stop_timers() {
    AUDIO_IRQ.disable();
    TICK_IRQ.disable();

    pac::TIM21.cr1().modify(|w| w.set_cen(false));
    pac::TIM22.cr1().modify(|w| w.set_cen(false));
    AUDIO_IRQ.unpend();
    TICK_IRQ.unpend();
}

/// Makes the next executor idle enter STOP instead of SLEEP.
///
/// Without [`SaberConfig::deep_sleep_when_dormant`] (`debug-mode`) the core
/// only sleeps, so HSI16 keeps running and the SWD link stays up.
///
/// [`SaberConfig::deep_sleep_when_dormant`]: saber::config::SaberConfig::deep_sleep_when_dormant
fn arm_stop_mode() {
    pac::RCC.apb1enr().modify(|w| w.set_pwren(true));
    pac::PWR.cr().modify(|w| {
        w.set_pdds(pac::pwr::vals::Pdds::STOP_MODE);
        w.set_ulp(true);
        w.set_cwuf(true);
    });
    pac::RCC
        .cfgr()
        .modify(|w| w.set_stopwuck(pac::rcc::vals::Stopwuck::HSI16));

    if CONFIG.deep_sleep_when_dormant {
        let mut core = unsafe { cortex_m::Peripherals::steal() };
        core.SCB.set_sleepdeep();
    }
}

/// Undoes [`arm_stop_mode`].
fn disarm_stop_mode() {
    let mut core = unsafe { cortex_m::Peripherals::steal() };
    core.SCB.clear_sleepdeep();
}

/// The hilt board as seen by the control loop.
pub struct SaberBoard {
    /// Button EXTI line, awaited while dormant
    wake: ExtiInput<'static>,
    imu: &'static ImuMutex,
}

impl SaberBoard {
    /// Creates the board.
    ///
    /// # Arguments
    ///
    /// * `wake` - Button EXTI input, awaited while dormant
    /// * `imu` - Motion sensor, shared with the motion task
    pub fn new(wake: ExtiInput<'static>, imu: &'static ImuMutex) -> Self {
        Self { wake, imu }
    }
}

impl Board for SaberBoard {
    fn restore_clocks(&mut self) {
        disarm_stop_mode();
        // Wake time is the only entropy the board has.
        ENTROPY.reseed(Instant::now().as_ticks() as u32);
        start_timers();
    }

    async fn enter_dormant(&mut self) {
        stop_timers();
        arm_stop_mode();

        #[cfg(feature = "debug-mode")]
        defmt::info!("Dormant, waiting for button...");

        self.wake.wait_for_falling_edge().await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        Timer::after_millis(u64::from(ms)).await;
    }

    async fn yield_now(&mut self) {
        embassy_futures::yield_now().await;
    }

    async fn sensor_wake(&mut self) {
        if let Err(e) = self.imu.lock().await.wake() {
            defmt::warn!("imu: wake failed: {}", e);
        }
    }

    async fn sensor_sleep(&mut self) {
        if let Err(e) = self.imu.lock().await.sleep() {
            defmt::warn!("imu: sleep failed: {}", e);
        }
    }
}
