//! MPU-6050 register protocol.
//!
//! Only the slice of the device the saber needs: reset, sleep/wake, the
//! motion and zero-motion interrupt detectors, and the two status
//! registers read when the interrupt line falls. The byte sequences match
//! what the hardware expects and must not be reordered.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::MotionThresholds;
use crate::fmt::warn;
use crate::motion::{MotionSensor, MotionStatus, ResetOutcome};

/// Default 7-bit bus address (AD0 low).
pub const ADDRESS: u8 = 0x68;

/// Register map.
pub mod reg {
    pub const ACCEL_CONFIG: u8 = 0x1c;
    pub const MOT_THR: u8 = 0x1f;
    pub const MOT_DUR: u8 = 0x20;
    pub const ZRMOT_THR: u8 = 0x21;
    pub const ZRMOT_DUR: u8 = 0x22;
    pub const INT_PIN_CFG: u8 = 0x37;
    pub const INT_ENABLE: u8 = 0x38;
    pub const INT_STATUS: u8 = 0x3a;
    pub const MOT_DETECT_STATUS: u8 = 0x61;
    pub const SIGNAL_PATH_RESET: u8 = 0x68;
    pub const MOT_DETECT_CTRL: u8 = 0x69;
    pub const PWR_MGMT_1: u8 = 0x6b;
}

const PWR_DEVICE_RESET: u8 = 0x80;
const PWR_SLEEP: u8 = 0x40;

/// Polls of the reset bit before giving up.
pub const RESET_ATTEMPTS: u8 = 10;
/// Delay between reset polls.
pub const RESET_POLL_MS: u32 = 10;
/// Settle time after each reset stage.
const RESET_SETTLE_MS: u32 = 100;

/// MPU-6050 on an `embedded-hal` I2C bus.
pub struct Mpu6050<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C, D> Mpu6050<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Wraps the sensor without touching it.
    ///
    /// # Arguments
    ///
    /// * `i2c` - Bus the sensor sits on, at its default address
    /// * `delay` - Delay source for the reset wait
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            i2c,
            delay,
            address: ADDRESS,
        }
    }

    /// Gives the bus and delay back.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[reg, value])
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut buf = [0u8];
        self.i2c.write_read(self.address, &[reg], &mut buf)?;
        Ok(buf[0])
    }

    /// Configures the motion and zero-motion interrupts and the pin.
    ///
    /// The pin is first set push-pull latched, then switched to active low
    /// once the detectors are armed.
    pub fn configure_interrupt(&mut self, thresholds: MotionThresholds) -> Result<(), I2C::Error> {
        self.write_reg(reg::INT_PIN_CFG, 0x20)?;
        // 5 Hz digital high-pass filter
        self.write_reg(reg::ACCEL_CONFIG, 0x01)?;
        self.configure_thresholds(thresholds)?;
        // 1 ms extra power-on delay, 1 ms decrement rate
        self.write_reg(reg::MOT_DETECT_CTRL, 0x15)?;
        self.write_reg(reg::INT_ENABLE, 0x60)?;
        self.write_reg(reg::INT_PIN_CFG, 0xa0)
    }
}

impl<I2C, D> MotionSensor for Mpu6050<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    type Error = I2C::Error;

    fn reset(&mut self) -> Result<ResetOutcome, I2C::Error> {
        self.write_reg(reg::PWR_MGMT_1, PWR_DEVICE_RESET)?;

        let mut power = PWR_DEVICE_RESET;
        let mut attempts = 0;
        while power & PWR_DEVICE_RESET != 0 && attempts < RESET_ATTEMPTS {
            power = self.read_reg(reg::PWR_MGMT_1)?;
            attempts += 1;
            self.delay.delay_ms(RESET_POLL_MS);
        }
        let outcome = if power & PWR_DEVICE_RESET != 0 {
            warn!("mpu6050: reset bit still set after {} polls", attempts);
            ResetOutcome::TimedOut
        } else {
            ResetOutcome::Complete
        };

        // The device comes out of reset asleep.
        self.write_reg(reg::PWR_MGMT_1, power & !PWR_SLEEP)?;
        self.delay.delay_ms(RESET_SETTLE_MS);

        // Gyro, accelerometer and temperature signal paths.
        self.write_reg(reg::SIGNAL_PATH_RESET, 0x07)?;
        self.delay.delay_ms(RESET_SETTLE_MS);

        Ok(outcome)
    }

    fn sleep(&mut self) -> Result<(), I2C::Error> {
        self.write_reg(reg::PWR_MGMT_1, PWR_SLEEP)
    }

    fn wake(&mut self) -> Result<(), I2C::Error> {
        let power = self.read_reg(reg::PWR_MGMT_1)?;
        self.write_reg(reg::PWR_MGMT_1, power & !PWR_SLEEP)
    }

    fn configure_thresholds(&mut self, t: MotionThresholds) -> Result<(), I2C::Error> {
        self.write_reg(reg::MOT_THR, t.clash_threshold)?;
        self.write_reg(reg::MOT_DUR, t.clash_duration)?;
        self.write_reg(reg::ZRMOT_THR, t.swing_threshold)?;
        self.write_reg(reg::ZRMOT_DUR, t.swing_duration)
    }
}

impl<I2C, D> MotionStatus for Mpu6050<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    type Error = I2C::Error;

    fn interrupt_status(&mut self) -> Result<u8, I2C::Error> {
        self.read_reg(reg::INT_STATUS)
    }

    fn motion_detect_status(&mut self) -> Result<u8, I2C::Error> {
        self.read_reg(reg::MOT_DETECT_STATUS)
    }
}
