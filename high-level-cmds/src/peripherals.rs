//! The hardware the rover core talks to.
//!
//! Each trait is a thin seam over a driver. The core only ever sees these traits,
//! so the same control code runs on the robot and in the simulator.

use crate::{command::ServoChannel, LinePattern, Mode, WheelSpeedPair};

/// The motor driver: a pure sink of per-wheel signed duty.
pub trait WheelActuator {
    type Error: core::fmt::Debug;

    /// Apply the given duty to both wheels.
    /// A zero speed releases the wheel (no drive on either polarity line), it does not brake.
    fn set_wheel_duty(&mut self, speeds: WheelSpeedPair) -> Result<(), Self::Error>;
}

/// The gyro that integrates heading about the vertical axis.
///
/// Heading grows counter-clockwise and is not wrapped: two full turns to the left read 720.
pub trait OrientationSensor {
    type Error: core::fmt::Debug;

    /// Take a fresh sample. Must be called before [`OrientationSensor::heading_degrees`]
    /// to avoid reading a stale value.
    async fn refresh(&mut self) -> Result<(), Self::Error>;

    /// Heading as of the last refresh, in degrees.
    fn heading_degrees(&self) -> f64;

    /// Measure and remove the gyro bias. The rover must be standing still.
    async fn calibrate(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// The ultrasonic range finder.
pub trait RangeSensor {
    /// Distance to the nearest obstacle in front, in centimeters.
    /// Returns `None` if no echo came back.
    async fn distance_cm(&mut self) -> Option<f64>;
}

/// The downward-looking line-sensor array.
pub trait LineSensorArray {
    type Error: core::fmt::Debug;

    async fn pattern(&mut self) -> Result<LinePattern, Self::Error>;
}

/// The hobby servos, used for the gripper.
pub trait ServoOutput {
    type Error: core::fmt::Debug;

    /// Move the servo to `degrees`, which must lie in `0..=180`.
    fn write_angle(&mut self, channel: ServoChannel, degrees: u8) -> Result<(), Self::Error>;
}

/// Mode indication (LEDs, display). Fire and forget.
pub trait StatusIndicator {
    fn set_indicator(&mut self, mode: Mode);
}

/// A peripheral that is not fitted.
///
/// It can never be constructed, so `Option<Absent>` is always `None`. It is used
/// as the type parameter for missing sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absent {}

impl OrientationSensor for Absent {
    type Error = core::convert::Infallible;

    async fn refresh(&mut self) -> Result<(), Self::Error> {
        match *self {}
    }

    fn heading_degrees(&self) -> f64 {
        match *self {}
    }
}

impl LineSensorArray for Absent {
    type Error = core::convert::Infallible;

    async fn pattern(&mut self) -> Result<LinePattern, Self::Error> {
        match *self {}
    }
}

impl ServoOutput for Absent {
    type Error = core::convert::Infallible;

    fn write_angle(&mut self, _channel: ServoChannel, _degrees: u8) -> Result<(), Self::Error> {
        match *self {}
    }
}

/// An indicator that shows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn set_indicator(&mut self, _mode: Mode) {}
}
