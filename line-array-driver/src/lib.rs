#![cfg_attr(not(test), no_std)]
pub mod gpioexp;

use embedded_hal_async::i2c::I2c;
use high_level_cmds::{peripherals::LineSensorArray, LinePattern};
use log::debug;

/// Four reflective line sensors and two indicator LEDs on a PCF8574 expander.
pub struct LineArray<I2C: I2c> {
    gpioexp: gpioexp::GpioExpander<I2C>,
}

// Sensors occupy P0..P3, left to right. A pin reads high over the dark line.
const SENSOR_MASK: u8 = 0b0000_1111;
const LEFT_LED_PIN: u8 = 4;
const RIGHT_LED_PIN: u8 = 5;

impl<I2C: I2c> LineArray<I2C> {
    pub fn new(device: I2C) -> Self {
        Self {
            gpioexp: gpioexp::GpioExpander::new(device),
        }
    }

    pub fn new_with_address(device: I2C, address: u8) -> Self {
        Self {
            gpioexp: gpioexp::GpioExpander::new_with_address(device, address),
        }
    }

    /// Release the sensor pins and switch both LEDs off.
    /// Fails if nothing answers on the bus, which means the array is not fitted.
    pub async fn init(&mut self) -> Result<(), I2C::Error> {
        self.gpioexp.reset().await?;
        self.set_leds(false, false).await
    }

    pub async fn read_sensors(&mut self) -> Result<[bool; 4], I2C::Error> {
        let port = self.gpioexp.digital_read_port().await?;
        let pattern = LinePattern::from_bits(port & SENSOR_MASK);
        debug!("Line port: {:#010b}", port);
        Ok(pattern.sensors())
    }

    async fn set_leds(&mut self, left: bool, right: bool) -> Result<(), I2C::Error> {
        self.gpioexp.digital_write(LEFT_LED_PIN, left).await?;
        self.gpioexp.digital_write(RIGHT_LED_PIN, right).await
    }

    pub fn free(self) -> I2C {
        self.gpioexp.device
    }
}

impl<I2C: I2c> LineSensorArray for LineArray<I2C> {
    type Error = I2C::Error;

    async fn pattern(&mut self) -> Result<LinePattern, Self::Error> {
        Ok(LinePattern::from_sensors(self.read_sensors().await?))
    }
}
