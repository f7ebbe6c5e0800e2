//! Peripherals backed by the simulated plant.
//!
//! The motor driver, the servos and the line array are the real drivers; only the PWM
//! channels and the I2C bus under them are simulated.

use std::{convert::Infallible, future::Future, time::Duration};

use embedded_hal::{
    i2c::{ErrorKind, NoAcknowledgeSource},
    pwm::{ErrorType as PwmErrorType, SetDutyCycle},
};
use embedded_hal_async::i2c::{ErrorType as I2cErrorType, I2c, Operation};
use high_level_cmds::{
    peripherals::{OrientationSensor, RangeSensor, StatusIndicator},
    Clock, Instant, Mode,
};
use line_array_driver::gpioexp::GPIO_EXPANDER_DEFAULT_I2C_ADDRESS;
use log::{debug, info};

use crate::plant::{PwmLine, SharedPlant, PWM_PERIOD};

#[derive(Clone, Copy)]
pub struct HostClock {
    start: std::time::Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for HostClock {
    fn now(&self) -> Instant {
        Instant::from_duration(self.start.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        async_std::task::sleep(duration)
    }
}

pub struct SimPwm {
    plant: SharedPlant,
    line: PwmLine,
}

impl SimPwm {
    pub fn new(plant: &SharedPlant, line: PwmLine) -> Self {
        Self {
            plant: plant.clone(),
            line,
        }
    }
}

impl PwmErrorType for SimPwm {
    type Error = Infallible;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        PWM_PERIOD
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if let PwmLine::Servo(i) = self.line {
            debug!("Servo {} duty {}", i + 1, duty);
        }
        self.plant.set_pwm(self.line, duty);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nack;

impl embedded_hal::i2c::Error for Nack {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

/// I2C bus with the line array's PCF8574 on it, or with nothing at all.
pub struct SimI2c {
    plant: SharedPlant,
    fitted: bool,
    latch: u8,
}

impl SimI2c {
    pub fn new(plant: &SharedPlant, fitted: bool) -> Self {
        Self {
            plant: plant.clone(),
            fitted,
            latch: 0xff,
        }
    }
}

impl I2cErrorType for SimI2c {
    type Error = Nack;
}

impl I2c for SimI2c {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if !self.fitted || address != GPIO_EXPANDER_DEFAULT_I2C_ADDRESS {
            return Err(Nack);
        }
        for op in operations.iter_mut() {
            match op {
                // Pins driven low read low, released ones read the sensors
                Operation::Read(buf) => buf.fill((self.plant.line_bits() | 0xf0) & self.latch),
                Operation::Write(bytes) => {
                    if let Some(latch) = bytes.last() {
                        self.latch = *latch;
                    }
                }
            }
        }
        Ok(())
    }
}

/// A gyro with a constant bias. Calibration measures the bias while standing still.
pub struct SimImu {
    plant: SharedPlant,
    clock: HostClock,
    bias: f64,
    heading: f64,
}

const CALIBRATION_TIME: Duration = Duration::from_millis(500);

impl SimImu {
    pub fn new(plant: &SharedPlant, clock: HostClock) -> Self {
        Self {
            plant: plant.clone(),
            clock,
            bias: 0.0,
            heading: 0.0,
        }
    }
}

impl OrientationSensor for SimImu {
    type Error = Infallible;

    async fn refresh(&mut self) -> Result<(), Self::Error> {
        let t = self.plant.elapsed().as_secs_f64();
        self.heading = self.plant.gyro_heading() - self.bias * t;
        Ok(())
    }

    fn heading_degrees(&self) -> f64 {
        self.heading
    }

    async fn calibrate(&mut self) -> Result<(), Self::Error> {
        let before = self.plant.gyro_heading();
        self.clock.sleep(CALIBRATION_TIME).await;
        self.bias = (self.plant.gyro_heading() - before) / CALIBRATION_TIME.as_secs_f64();
        info!("Gyro bias {:.3} deg/s", self.bias);
        Ok(())
    }
}

pub struct SimSonar {
    plant: SharedPlant,
}

impl SimSonar {
    pub fn new(plant: &SharedPlant) -> Self {
        Self { plant: plant.clone() }
    }
}

impl RangeSensor for SimSonar {
    async fn distance_cm(&mut self) -> Option<f64> {
        self.plant.range()
    }
}

/// Prints the mode color instead of lighting an LED.
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn set_indicator(&mut self, mode: Mode) {
        let rgb = mode.color();
        info!("LED #{:02x}{:02x}{:02x} ({:?})", rgb.0, rgb.1, rgb.2, mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plant::{Plant, PlantConfig};
    use high_level_cmds::{peripherals::LineSensorArray, LinePattern};
    use line_array_driver::LineArray;

    #[test]
    fn test_line_array_over_sim_bus() {
        let plant = Plant::new(PlantConfig::default());
        let mut array = LineArray::new(SimI2c::new(&plant, true));
        async_std::task::block_on(async {
            array.init().await.unwrap();
            assert_eq!(
                array.pattern().await.unwrap(),
                LinePattern::from_sensors([false, true, true, false])
            );
        });
    }

    #[test]
    fn test_missing_line_array_nacks() {
        let plant = Plant::new(PlantConfig::default());
        let mut array = LineArray::new(SimI2c::new(&plant, false));
        assert_eq!(async_std::task::block_on(array.init()), Err(Nack));
    }
}
