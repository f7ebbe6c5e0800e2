use embedded_hal_async::i2c::I2c;

/// PCF8574 quasi-bidirectional 8-bit port expander.
///
/// The chip has no direction register: a pin written high is weakly pulled up and can
/// be read as an input, a pin written low is actively driven low. So the output latch
/// has to keep every input pin high.
pub struct GpioExpander<I2C>
where
    I2C: I2c,
{
    pub device: I2C,
    pub address: u8,
    latch: u8,
}

// Base address 0x20 with A0 and A1 strapped high, as fitted on the rover board
pub const GPIO_EXPANDER_DEFAULT_I2C_ADDRESS: u8 = 0x23;
const LATCH_ALL_INPUTS: u8 = 0xff;

impl<I2C, E> GpioExpander<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(device: I2C) -> Self {
        Self::new_with_address(device, GPIO_EXPANDER_DEFAULT_I2C_ADDRESS)
    }

    pub fn new_with_address(device: I2C, address: u8) -> Self {
        Self {
            device,
            address,
            latch: LATCH_ALL_INPUTS,
        }
    }

    /// Release every pin (all high, usable as inputs).
    pub async fn reset(&mut self) -> Result<(), E> {
        self.latch = LATCH_ALL_INPUTS;
        self.write_latch().await
    }

    pub async fn digital_read_port(&mut self) -> Result<u8, E> {
        let mut buf = [0u8; 1];
        self.device.read(self.address, &mut buf).await?;
        Ok(buf[0])
    }

    /// Pin number from 0 to 7 (wrapped if outside).
    pub async fn digital_read(&mut self, pin: u8) -> Result<bool, E> {
        let port = self.digital_read_port().await?;
        Ok(port & (1 << (pin & 7)) != 0)
    }

    /// Pin number from 0 to 7 (wrapped if outside).
    pub async fn digital_write(&mut self, pin: u8, value: bool) -> Result<(), E> {
        let mask = 1 << (pin & 7);
        if value {
            self.latch |= mask;
        } else {
            self.latch &= !mask;
        }
        self.write_latch().await
    }

    pub fn latch(&self) -> u8 {
        self.latch
    }

    async fn write_latch(&mut self) -> Result<(), E> {
        self.device.write(self.address, &[self.latch]).await
    }
}
