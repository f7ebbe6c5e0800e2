use high_level_cmds::{peripherals::WheelActuator, Clock, WheelSpeedPair};

use crate::config::MotionConfig;

/// Writes wheel speeds to the motor driver without drawing both motors' inrush
/// current at the same moment.
pub struct WheelSpeedSmoother<A: WheelActuator> {
    actuator: A,
    current: WheelSpeedPair,
    ramp_threshold: i32,
    ramp_speed: i32,
    ramp_settle: core::time::Duration,
    stop_settle: core::time::Duration,
}

impl<A: WheelActuator> WheelSpeedSmoother<A> {
    pub fn new(actuator: A, config: &MotionConfig) -> Self {
        Self {
            actuator,
            current: WheelSpeedPair::STOPPED,
            ramp_threshold: config.ramp_threshold,
            ramp_speed: config.ramp_speed,
            ramp_settle: config.ramp_settle,
            stop_settle: config.stop_settle,
        }
    }

    /// The speeds most recently applied.
    pub fn current(&self) -> WheelSpeedPair {
        self.current
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn into_inner(self) -> A {
        self.actuator
    }

    /// Would going to `target` change both wheels by a lot at once?
    fn needs_ramp(&self, target: WheelSpeedPair) -> bool {
        let big_change =
            |to: i8, from: i8| to != 0 && (to as i32 - from as i32).abs() > self.ramp_threshold;
        big_change(target.left(), self.current.left())
            && big_change(target.right(), self.current.right())
    }

    /// Apply `target` to the wheels.
    ///
    /// If both wheels change by more than the ramp threshold and neither is released,
    /// both first run at the ramp speed (in the requested direction) for the ramp
    /// settle time.
    pub async fn set_speed<C: Clock>(
        &mut self,
        target: WheelSpeedPair,
        clock: &C,
    ) -> Result<(), A::Error> {
        if self.needs_ramp(target) {
            let step = WheelSpeedPair::new(
                self.ramp_speed * target.left().signum() as i32,
                self.ramp_speed * target.right().signum() as i32,
            );
            self.actuator.set_wheel_duty(step)?;
            clock.sleep(self.ramp_settle).await;
        }

        self.actuator.set_wheel_duty(target)?;
        self.current = target;
        Ok(())
    }

    /// Release both wheels and wait for the motors to spin down.
    pub async fn stop<C: Clock>(&mut self, clock: &C) -> Result<(), A::Error> {
        self.actuator.set_wheel_duty(WheelSpeedPair::STOPPED)?;
        self.current = WheelSpeedPair::STOPPED;
        clock.sleep(self.stop_settle).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{RecordingWheels, SimClock};
    use core::time::Duration;
    use embassy_futures::block_on;

    fn smoother() -> (SimClock, RecordingWheels, WheelSpeedSmoother<RecordingWheels>) {
        let clock = SimClock::default();
        let wheels = RecordingWheels::new(&clock);
        let s = WheelSpeedSmoother::new(wheels.clone(), &MotionConfig::default());
        (clock, wheels, s)
    }

    #[test]
    fn test_ramp_from_standstill() {
        let (clock, wheels, mut s) = smoother();
        block_on(s.set_speed(WheelSpeedPair::new(80, 80), &clock)).unwrap();

        let writes = wheels.writes.borrow().clone();
        assert_eq!(
            writes,
            vec![
                (Duration::ZERO, WheelSpeedPair::new(30, 30)),
                (Duration::from_millis(200), WheelSpeedPair::new(80, 80)),
            ]
        );
        assert_eq!(s.current(), WheelSpeedPair::new(80, 80));
    }

    #[test]
    fn test_ramp_keeps_direction() {
        let (clock, wheels, mut s) = smoother();
        block_on(s.set_speed(WheelSpeedPair::new(-60, 90), &clock)).unwrap();
        assert_eq!(wheels.speeds(), vec![(-30, 30), (-60, 90)]);
    }

    #[test]
    fn test_no_ramp_for_small_or_one_sided_changes() {
        let (clock, wheels, mut s) = smoother();
        // Only 30 on each side: not more than the threshold
        block_on(s.set_speed(WheelSpeedPair::new(30, -30), &clock)).unwrap();
        // Left changes a lot, right does not
        block_on(s.set_speed(WheelSpeedPair::new(100, -40), &clock)).unwrap();
        // Right is released
        block_on(s.set_speed(WheelSpeedPair::new(20, 0), &clock)).unwrap();
        assert_eq!(wheels.speeds(), vec![(30, -30), (100, -40), (20, 0)]);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_reversal_ramps_through_opposite_sign() {
        let (clock, wheels, mut s) = smoother();
        block_on(s.set_speed(WheelSpeedPair::new(25, 25), &clock)).unwrap();
        block_on(s.set_speed(WheelSpeedPair::new(-50, -50), &clock)).unwrap();
        assert_eq!(wheels.speeds(), vec![(25, 25), (-30, -30), (-50, -50)]);
    }

    #[test]
    fn test_stop_waits_settle() {
        let (clock, wheels, mut s) = smoother();
        block_on(s.set_speed(WheelSpeedPair::new(40, 40), &clock)).unwrap();
        let before = clock.elapsed();
        block_on(s.stop(&clock)).unwrap();
        assert_eq!(wheels.last(), Some((0, 0)));
        assert_eq!(clock.elapsed() - before, Duration::from_millis(20));
        assert!(s.current().is_stopped());
    }

    #[test]
    fn test_never_outside_duty_range() {
        let (clock, wheels, mut s) = smoother();
        for (l, r) in [(500, -500), (-101, 101), (i32::MAX, i32::MIN), (7, -3)] {
            block_on(s.set_speed(WheelSpeedPair::new(l, r), &clock)).unwrap();
        }
        assert!(wheels
            .speeds()
            .iter()
            .all(|(l, r)| (-100..=100).contains(l) && (-100..=100).contains(r)));
    }
}
