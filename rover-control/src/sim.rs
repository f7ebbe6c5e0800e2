//! Simulated hardware for the unit tests. Time only moves when someone sleeps.

use core::{cell::Cell, convert::Infallible, future::Future, time::Duration};
use std::{cell::RefCell, rc::Rc, vec::Vec};

use high_level_cmds::{
    command::ServoChannel,
    peripherals::{
        LineSensorArray, OrientationSensor, RangeSensor, ServoOutput, StatusIndicator,
        WheelActuator,
    },
    Clock, Instant, LinePattern, Mode, WheelSpeedPair,
};

#[derive(Clone, Default)]
pub struct SimClock(Rc<Cell<Duration>>);

impl SimClock {
    pub fn elapsed(&self) -> Duration {
        self.0.get()
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_duration(self.0.get())
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        self.0.set(self.0.get() + duration);
        core::future::ready(())
    }
}

/// Remembers every duty write together with the time it happened.
#[derive(Clone)]
pub struct RecordingWheels {
    clock: SimClock,
    pub writes: Rc<RefCell<Vec<(Duration, WheelSpeedPair)>>>,
}

impl RecordingWheels {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            writes: Rc::default(),
        }
    }

    pub fn speeds(&self) -> Vec<(i8, i8)> {
        self.writes
            .borrow()
            .iter()
            .map(|(_, p)| (p.left(), p.right()))
            .collect()
    }

    pub fn last(&self) -> Option<(i8, i8)> {
        self.speeds().last().copied()
    }

    /// Writes with consecutive duplicates removed.
    pub fn distinct_speeds(&self) -> Vec<(i8, i8)> {
        let mut speeds = self.speeds();
        speeds.dedup();
        speeds
    }
}

impl WheelActuator for RecordingWheels {
    type Error = Infallible;

    fn set_wheel_duty(&mut self, speeds: WheelSpeedPair) -> Result<(), Self::Error> {
        self.writes.borrow_mut().push((self.clock.elapsed(), speeds));
        Ok(())
    }
}

/// Gyro whose heading is `offset + rate * t`, both adjustable from the test.
#[derive(Clone)]
pub struct SimGyro {
    clock: SimClock,
    pub rate: Rc<Cell<f64>>,
    pub offset: Rc<Cell<f64>>,
    pub calibrations: Rc<Cell<u32>>,
    heading: f64,
}

impl SimGyro {
    pub fn new(clock: &SimClock, rate: f64) -> Self {
        Self {
            clock: clock.clone(),
            rate: Rc::new(Cell::new(rate)),
            offset: Rc::default(),
            calibrations: Rc::default(),
            heading: 0.0,
        }
    }
}

impl OrientationSensor for SimGyro {
    type Error = Infallible;

    async fn refresh(&mut self) -> Result<(), Self::Error> {
        self.heading = self.offset.get() + self.rate.get() * self.clock.elapsed().as_secs_f64();
        Ok(())
    }

    fn heading_degrees(&self) -> f64 {
        self.heading
    }

    async fn calibrate(&mut self) -> Result<(), Self::Error> {
        self.calibrations.set(self.calibrations.get() + 1);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct SimRange(pub Rc<Cell<Option<f64>>>);

impl RangeSensor for SimRange {
    async fn distance_cm(&mut self) -> Option<f64> {
        self.0.get()
    }
}

#[derive(Clone)]
pub struct SimLine(pub Rc<Cell<LinePattern>>);

impl LineSensorArray for SimLine {
    type Error = Infallible;

    async fn pattern(&mut self) -> Result<LinePattern, Self::Error> {
        Ok(self.0.get())
    }
}

#[derive(Clone, Default)]
pub struct RecordingServos(pub Rc<RefCell<Vec<(ServoChannel, u8)>>>);

impl ServoOutput for RecordingServos {
    type Error = Infallible;

    fn write_angle(&mut self, channel: ServoChannel, degrees: u8) -> Result<(), Self::Error> {
        self.0.borrow_mut().push((channel, degrees));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingIndicator(pub Rc<RefCell<Vec<Mode>>>);

impl StatusIndicator for RecordingIndicator {
    fn set_indicator(&mut self, mode: Mode) {
        self.0.borrow_mut().push(mode);
    }
}
