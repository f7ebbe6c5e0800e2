use embedded_hal::pwm::SetDutyCycle;
use high_level_cmds::{command::ServoChannel, peripherals::ServoOutput};

use crate::EitherError;

/// The servo pulse is expressed in counts of a 1023-count, 50 Hz period.
const PERIOD_COUNTS: u16 = 1023;
/// Pulse width at 0 degrees (about 0.5 ms).
const MIN_PULSE_COUNTS: u16 = 25;
/// Extra counts between 0 degrees and the full range (about 2 ms).
const RANGE_COUNTS: u16 = 100;
pub const MAX_ANGLE: u8 = 180;

/// Two hobby servos on PWM outputs configured for 50 Hz.
pub struct ServoPair<S1, S2>
where
    S1: SetDutyCycle,
    S2: SetDutyCycle,
{
    s1: S1,
    s2: S2,
}

/// Duty counts for a servo angle. Angles above [`MAX_ANGLE`] are clamped.
pub fn pulse_counts(degrees: u8) -> u16 {
    let degrees = degrees.min(MAX_ANGLE) as u16;
    MIN_PULSE_COUNTS + degrees * RANGE_COUNTS / MAX_ANGLE as u16
}

impl<S1, S2, E1, E2> ServoPair<S1, S2>
where
    S1: SetDutyCycle<Error = E1>,
    S2: SetDutyCycle<Error = E2>,
{
    pub fn new(s1: S1, s2: S2) -> Self {
        Self { s1, s2 }
    }

    fn write_counts(
        &mut self,
        channel: ServoChannel,
        counts: u16,
    ) -> Result<(), EitherError<E1, E2>> {
        match channel {
            ServoChannel::S1 => self
                .s1
                .set_duty_cycle_fraction(counts, PERIOD_COUNTS)
                .map_err(EitherError::Left),
            ServoChannel::S2 => self
                .s2
                .set_duty_cycle_fraction(counts, PERIOD_COUNTS)
                .map_err(EitherError::Right),
        }
    }

    pub fn free(self) -> (S1, S2) {
        (self.s1, self.s2)
    }
}

impl<S1, S2, E1, E2> ServoOutput for ServoPair<S1, S2>
where
    S1: SetDutyCycle<Error = E1>,
    S2: SetDutyCycle<Error = E2>,
    E1: core::fmt::Debug,
    E2: core::fmt::Debug,
{
    type Error = EitherError<E1, E2>;

    fn write_angle(&mut self, channel: ServoChannel, degrees: u8) -> Result<(), Self::Error> {
        self.write_counts(channel, pulse_counts(degrees))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pwm::FakePwm;

    #[test]
    fn test_pulse_counts() {
        assert_eq!(pulse_counts(0), 25);
        assert_eq!(pulse_counts(90), 75);
        assert_eq!(pulse_counts(180), 125);
        assert_eq!(pulse_counts(255), 125);
    }

    #[test]
    fn test_write_angle_per_channel() {
        let mut servos = ServoPair::new(FakePwm::default(), FakePwm::default());
        assert!(servos.write_angle(ServoChannel::S1, 20).is_ok());
        assert!(servos.write_angle(ServoChannel::S2, 90).is_ok());
        let (s1, s2) = servos.free();
        // FakePwm has a 1023-count period, so the counts go through unchanged
        assert_eq!(s1.duty, pulse_counts(20));
        assert_eq!(s2.duty, 75);
    }
}
