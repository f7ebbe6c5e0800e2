use core::time::Duration;

use high_level_cmds::{
    peripherals::{OrientationSensor, WheelActuator},
    Clock, MotionIntent, MoveDirection, TurnDirection, WheelSpeedPair,
};
use libm::fabs;
use log::{debug, info, warn};

use crate::{
    config::MotionConfig,
    error::{check_angle, check_speed, MotionError, ParameterError},
    smoother::WheelSpeedSmoother,
    straight::{Correction, HeadingHold},
    turn::{TurnStep, TurnToAngle},
};

/// Something that can ask a running maneuver to give up early.
pub trait Interrupt {
    fn is_raised(&self) -> bool;
}

/// Maneuvers run to the end.
pub struct Uninterrupted;

impl Interrupt for Uninterrupted {
    fn is_raised(&self) -> bool {
        false
    }
}

/// How a maneuver ended. The wheels are stopped in every case except for an
/// untimed drive or pivot, which keeps going after it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManeuverOutcome {
    Completed,
    TimedOut,
    Interrupted,
}

type MotionResult<T, A> = Result<T, MotionError<<A as WheelActuator>::Error>>;

/// The motion layer: turns [`MotionIntent`]s into wheel speeds.
pub struct Rover<A, O, C>
where
    A: WheelActuator,
    O: OrientationSensor,
    C: Clock,
{
    wheels: WheelSpeedSmoother<A>,
    orientation: Option<O>,
    clock: C,
    config: MotionConfig,
}

impl<A, O, C> Rover<A, O, C>
where
    A: WheelActuator,
    O: OrientationSensor,
    C: Clock,
{
    /// Without an orientation sensor, straight drives and angle turns run open loop.
    pub fn new(actuator: A, orientation: Option<O>, clock: C, config: MotionConfig) -> Self {
        Self {
            wheels: WheelSpeedSmoother::new(actuator, &config),
            orientation,
            clock,
            config,
        }
    }

    /// Release the wheels and calibrate the gyro. Call once, with the rover standing still.
    pub async fn begin(&mut self) -> MotionResult<(), A> {
        self.stop().await?;
        match self.orientation.as_mut() {
            Some(gyro) => match gyro.calibrate().await {
                Ok(()) => info!("Rover setup done with gyro"),
                Err(e) => warn!("Gyro calibration failed: {:?}", e),
            },
            None => warn!("No gyro detected, straight drives and angle turns run open loop"),
        }
        Ok(())
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn has_orientation(&self) -> bool {
        self.orientation.is_some()
    }

    /// Speeds currently applied to the wheels.
    pub fn wheel_speeds(&self) -> WheelSpeedPair {
        self.wheels.current()
    }

    pub fn actuator(&self) -> &A {
        self.wheels.actuator()
    }

    pub async fn execute<I: Interrupt>(
        &mut self,
        intent: MotionIntent,
        interrupt: &I,
    ) -> MotionResult<ManeuverOutcome, A> {
        match intent {
            MotionIntent::Forward {
                speed,
                duration,
                straight,
            } => {
                let speed = check_speed(speed)? as i32;
                self.drive(speed, duration, straight, interrupt).await
            }
            MotionIntent::Backward {
                speed,
                duration,
                straight,
            } => {
                let speed = check_speed(speed)? as i32;
                self.drive(-speed, duration, straight, interrupt).await
            }
            MotionIntent::TurnLeft { speed, duration } => {
                let speed = check_speed(speed)?;
                self.pivot(TurnDirection::Left, speed, duration, interrupt).await
            }
            MotionIntent::TurnRight { speed, duration } => {
                let speed = check_speed(speed)?;
                self.pivot(TurnDirection::Right, speed, duration, interrupt).await
            }
            MotionIntent::TurnToAngle {
                angle,
                direction,
                speed,
            } => self.turn_to_angle(angle, direction, speed, interrupt).await,
            MotionIntent::Move { direction, speed } => {
                self.move_toward(direction, speed).await?;
                Ok(ManeuverOutcome::Completed)
            }
            MotionIntent::Stop => {
                self.stop().await?;
                Ok(ManeuverOutcome::Completed)
            }
        }
    }

    pub async fn set_wheel_speed(&mut self, speeds: WheelSpeedPair) -> MotionResult<(), A> {
        self.wheels
            .set_speed(speeds, &self.clock)
            .await
            .map_err(MotionError::Actuator)
    }

    /// Drive or arc toward `direction` until told otherwise.
    pub async fn move_toward(
        &mut self,
        direction: MoveDirection,
        speed: u8,
    ) -> MotionResult<(), A> {
        let speed = check_speed(speed)? as i32;
        self.set_wheel_speed(WheelSpeedPair::toward(direction, speed)).await
    }

    /// Release both wheels and wait for them to spin down.
    pub async fn stop(&mut self) -> MotionResult<(), A> {
        self.wheels.stop(&self.clock).await.map_err(MotionError::Actuator)
    }

    /// Wait for `duration` one control tick at a time, giving up when interrupted.
    pub async fn hold<I: Interrupt>(&self, duration: Duration, interrupt: &I) -> ManeuverOutcome {
        let deadline = self.clock.now() + duration;
        loop {
            if interrupt.is_raised() {
                return ManeuverOutcome::Interrupted;
            }
            let now = self.clock.now();
            if now >= deadline {
                return ManeuverOutcome::Completed;
            }
            let left = deadline.saturating_since(now);
            self.clock.sleep(left.min(self.config.control_tick)).await;
        }
    }

    /// Run `speeds`, then stop after `duration` (or leave the wheels running without one).
    async fn run_for<I: Interrupt>(
        &mut self,
        speeds: WheelSpeedPair,
        duration: Option<Duration>,
        interrupt: &I,
    ) -> MotionResult<ManeuverOutcome, A> {
        self.set_wheel_speed(speeds).await?;
        let Some(duration) = duration else {
            return Ok(ManeuverOutcome::Completed);
        };
        let outcome = self.hold(duration, interrupt).await;
        self.stop().await?;
        Ok(outcome)
    }

    /// `speed` is signed, negative drives backward. Heading hold needs a
    /// duration; untimed drives run open loop and return at once.
    async fn drive<I: Interrupt>(
        &mut self,
        speed: i32,
        duration: Option<Duration>,
        straight: bool,
        interrupt: &I,
    ) -> MotionResult<ManeuverOutcome, A> {
        if let Some(duration) = duration.filter(|_| straight && self.orientation.is_some()) {
            let outcome = self.run_straight(speed, duration, interrupt).await;
            return self.finish(outcome).await;
        }
        self.run_for(WheelSpeedPair::uniform(speed), duration, interrupt)
            .await
    }

    async fn pivot<I: Interrupt>(
        &mut self,
        direction: TurnDirection,
        speed: u8,
        duration: Option<Duration>,
        interrupt: &I,
    ) -> MotionResult<ManeuverOutcome, A> {
        self.run_for(WheelSpeedPair::pivot(direction, speed as i32), duration, interrupt)
            .await
    }

    /// Pivot until the heading changed by `angle` degrees, or the turn times out.
    pub async fn turn_to_angle<I: Interrupt>(
        &mut self,
        angle: f32,
        direction: TurnDirection,
        speed: u8,
        interrupt: &I,
    ) -> MotionResult<ManeuverOutcome, A> {
        let angle = check_angle(angle)? as f64;
        if check_speed(speed)? == 0 {
            return Err(ParameterError::Speed(0).into());
        }

        if self.orientation.is_none() {
            return self.timed_turn(angle, direction, speed, interrupt).await;
        }
        let outcome = self.run_turn(angle, direction, speed, interrupt).await;
        self.finish(outcome).await
    }

    /// Stop the wheels whatever happened, and report the first error.
    async fn finish(
        &mut self,
        outcome: MotionResult<ManeuverOutcome, A>,
    ) -> MotionResult<ManeuverOutcome, A> {
        let stopped = self.stop().await;
        let outcome = outcome?;
        stopped?;
        Ok(outcome)
    }

    async fn read_heading(&mut self) -> Option<f64> {
        let gyro = self.orientation.as_mut()?;
        match gyro.refresh().await {
            Ok(()) => Some(gyro.heading_degrees()),
            Err(e) => {
                warn!("Gyro refresh failed: {:?}", e);
                None
            }
        }
    }

    async fn run_straight<I: Interrupt>(
        &mut self,
        speed: i32,
        duration: Duration,
        interrupt: &I,
    ) -> MotionResult<ManeuverOutcome, A> {
        self.stop().await?;
        self.clock.sleep(self.config.straight_start_settle).await;
        let hold = self
            .read_heading()
            .await
            .map(|reference| HeadingHold::new(speed, reference, &self.config));

        self.set_wheel_speed(WheelSpeedPair::uniform(speed)).await?;
        let start = self.clock.now();
        loop {
            if self.clock.now().saturating_since(start) >= duration {
                return Ok(ManeuverOutcome::Completed);
            }
            if interrupt.is_raised() {
                return Ok(ManeuverOutcome::Interrupted);
            }

            let correction = match (hold, self.read_heading().await) {
                (Some(hold), Some(heading)) => hold.correction(heading),
                _ => Correction::Keep,
            };
            match correction {
                Correction::Keep => {}
                Correction::Steer(speeds) => self.set_wheel_speed(speeds).await?,
                Correction::Pulse { pulse, steer } => {
                    self.set_wheel_speed(pulse).await?;
                    self.clock.sleep(self.config.straight_pulse_hold).await;
                    self.set_wheel_speed(steer).await?;
                }
            }
            self.clock.sleep(self.config.control_tick).await;
        }
    }

    /// Open-loop replacement for [`Rover::turn_to_angle`] without a usable gyro.
    async fn timed_turn<I: Interrupt>(
        &mut self,
        angle: f64,
        direction: TurnDirection,
        speed: u8,
        interrupt: &I,
    ) -> MotionResult<ManeuverOutcome, A> {
        let duration = Duration::try_from_secs_f64(angle / self.config.turn.open_loop_rate)
            .map_err(|_| ParameterError::Angle(angle as f32))?;
        self.pivot(direction, speed, Some(duration), interrupt).await
    }

    async fn run_turn<I: Interrupt>(
        &mut self,
        angle: f64,
        direction: TurnDirection,
        speed: u8,
        interrupt: &I,
    ) -> MotionResult<ManeuverOutcome, A> {
        self.stop().await?;
        let Some(origin) = self.read_heading().await else {
            warn!("No heading to turn by, turning on a timer");
            return self.timed_turn(angle, direction, speed, interrupt).await;
        };

        let mut turn = TurnToAngle::new(angle, speed, self.clock.now(), &self.config.turn);
        self.set_wheel_speed(WheelSpeedPair::pivot(direction, turn.speed() as i32))
            .await?;
        loop {
            if interrupt.is_raised() {
                debug!("Turn interrupted");
                return Ok(ManeuverOutcome::Interrupted);
            }
            match self.read_heading().await {
                Some(heading) => {
                    let turned = fabs(heading - origin);
                    match turn.step(self.clock.now(), turned) {
                        TurnStep::Hold => {}
                        TurnStep::SetSpeed(speed) => {
                            let speeds = WheelSpeedPair::pivot(direction, speed as i32);
                            self.set_wheel_speed(speeds).await?
                        }
                        TurnStep::Reached => {
                            debug!("Turned {:.1} of {:.1} degrees", turned, angle);
                            return Ok(ManeuverOutcome::Completed);
                        }
                        TurnStep::TimedOut => {
                            warn!("Turn timed out after {:.1} of {:.1} degrees", turned, angle);
                            return Ok(ManeuverOutcome::TimedOut);
                        }
                    }
                }
                None if self.clock.now() >= turn.deadline() => {
                    return Ok(ManeuverOutcome::TimedOut);
                }
                None => {}
            }
            self.clock.sleep(self.config.control_tick).await;
        }
    }
}
