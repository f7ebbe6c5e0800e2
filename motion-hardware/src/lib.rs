#![cfg_attr(not(test), no_std)]

pub mod servo;

use embedded_hal::pwm::SetDutyCycle;
use high_level_cmds::{peripherals::WheelActuator, WheelSpeedPair};
use typebool::Bool;

pub use servo::ServoPair;

/// Which of the two bridge inputs failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EitherError<LeftErr, RightErr> {
    Left(LeftErr),
    Right(RightErr),
}

/// Two-channel H-bridge where every input line is PWM driven (DRV8833 style).
///
/// Each wheel has a pair of inputs: driving the first one spins the wheel one way,
/// driving the second one spins it the other way, and both off lets it coast.
/// `IsLeftForward` / `IsRightForward` say whether the first input of the pair is the
/// wheel's forward direction, so a motor wired backwards is fixed at the type level.
pub struct HBridgeMotorDriver<INA1, INA2, INB1, INB2, IsLeftForward, IsRightForward>
where
    INA1: SetDutyCycle,
    INA2: SetDutyCycle,
    INB1: SetDutyCycle,
    INB2: SetDutyCycle,
    IsLeftForward: Bool,
    IsRightForward: Bool,
{
    in_a1: INA1,
    in_a2: INA2,
    in_b1: INB1,
    in_b2: INB2,
    _left_forward: IsLeftForward,
    _right_forward: IsRightForward,
}

impl<INA1, INA2, INB1, INB2, LF, RF, LeftErr, RightErr>
    HBridgeMotorDriver<INA1, INA2, INB1, INB2, LF, RF>
where
    INA1: SetDutyCycle<Error = LeftErr>,
    INA2: SetDutyCycle<Error = LeftErr>,
    INB1: SetDutyCycle<Error = RightErr>,
    INB2: SetDutyCycle<Error = RightErr>,
    LF: Bool,
    RF: Bool,
{
    pub fn new(
        in_a1: INA1,
        in_a2: INA2,
        in_b1: INB1,
        in_b2: INB2,
        left_forward: LF,
        right_forward: RF,
    ) -> Self {
        Self {
            in_a1,
            in_a2,
            in_b1,
            in_b2,
            _left_forward: left_forward,
            _right_forward: right_forward,
        }
    }

    /// Release both wheels.
    pub fn release(&mut self) -> Result<(), EitherError<LeftErr, RightErr>> {
        drive_pair(&mut self.in_a1, &mut self.in_a2, 0, true).map_err(EitherError::Left)?;
        drive_pair(&mut self.in_b1, &mut self.in_b2, 0, true).map_err(EitherError::Right)?;
        Ok(())
    }

    pub fn free(self) -> (INA1, INA2, INB1, INB2) {
        (self.in_a1, self.in_a2, self.in_b1, self.in_b2)
    }
}

/// Put `speed` percent of duty on the line for the requested direction, and none on the other.
fn drive_pair<P1, P2, E>(
    first: &mut P1,
    second: &mut P2,
    speed: i8,
    first_is_forward: bool,
) -> Result<(), E>
where
    P1: SetDutyCycle<Error = E>,
    P2: SetDutyCycle<Error = E>,
{
    let duty = speed.unsigned_abs();
    let use_first = (speed > 0) == first_is_forward;
    if speed == 0 {
        first.set_duty_cycle_fully_off()?;
        second.set_duty_cycle_fully_off()?;
    } else if use_first {
        second.set_duty_cycle_fully_off()?;
        first.set_duty_cycle_percent(duty)?;
    } else {
        first.set_duty_cycle_fully_off()?;
        second.set_duty_cycle_percent(duty)?;
    }
    Ok(())
}

impl<INA1, INA2, INB1, INB2, LF, RF, LeftErr, RightErr> WheelActuator
    for HBridgeMotorDriver<INA1, INA2, INB1, INB2, LF, RF>
where
    INA1: SetDutyCycle<Error = LeftErr>,
    INA2: SetDutyCycle<Error = LeftErr>,
    INB1: SetDutyCycle<Error = RightErr>,
    INB2: SetDutyCycle<Error = RightErr>,
    LF: Bool,
    RF: Bool,
    LeftErr: core::fmt::Debug,
    RightErr: core::fmt::Debug,
{
    type Error = EitherError<LeftErr, RightErr>;

    fn set_wheel_duty(&mut self, speeds: WheelSpeedPair) -> Result<(), Self::Error> {
        drive_pair(&mut self.in_a1, &mut self.in_a2, speeds.left(), LF::VALUE)
            .map_err(EitherError::Left)?;
        drive_pair(&mut self.in_b1, &mut self.in_b2, speeds.right(), RF::VALUE)
            .map_err(EitherError::Right)?;
        Ok(())
    }
}
