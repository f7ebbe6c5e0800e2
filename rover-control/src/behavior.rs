//! The four rover modes and the control loop that runs them.

use embassy_sync::blocking_mutex::raw::RawMutex;
use high_level_cmds::{
    command::{DirectCommand, DirectionKey, PadButton, ServoChannel},
    peripherals::{
        LineSensorArray, OrientationSensor, RangeSensor, ServoOutput, StatusIndicator,
        WheelActuator,
    },
    Clock, LinePattern, Mode, MotionIntent, TurnDirection,
};
use log::{debug, info, warn};

use crate::{
    arbiter::CommandArbiter,
    config::BehaviorConfig,
    error::{check_speed, servo_angle_from_i32, speed_from_i32, MotionError},
    rover::{ManeuverOutcome, Rover, Uninterrupted},
};

/// What LineFinder does for a line-sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    HardLeft,
    SoftLeft,
    HardRight,
    SoftRight,
    /// Lost the line: back up.
    Reverse,
    Forward,
}

impl LineAction {
    pub fn from_pattern(pattern: LinePattern) -> Self {
        match pattern.sensors() {
            [true, false, false, false] => LineAction::HardLeft,
            [true, true, false, false] => LineAction::SoftLeft,
            [false, false, false, true] => LineAction::HardRight,
            [false, false, true, true] => LineAction::SoftRight,
            [false, false, false, false] => LineAction::Reverse,
            _ => LineAction::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvoidAction {
    /// Back off, then turn away.
    Escape,
    Cruise,
}

impl AvoidAction {
    /// `None` means no echo, which is as good as nothing in front.
    pub fn classify(distance: Option<f64>, config: &BehaviorConfig) -> Self {
        match distance {
            Some(d) if d < config.near_distance => AvoidAction::Escape,
            _ => AvoidAction::Cruise,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowAction {
    /// Too close.
    Reverse,
    /// In the comfort band.
    Hold,
    /// Target in range but too far.
    Approach,
    /// Nothing to follow.
    Lost,
}

impl FollowAction {
    pub fn classify(distance: Option<f64>, config: &BehaviorConfig) -> Self {
        match distance {
            Some(d) if d < config.near_distance => FollowAction::Reverse,
            Some(d) if d < config.follow_hold_distance => FollowAction::Hold,
            Some(d) if d < config.follow_far_distance => FollowAction::Approach,
            _ => FollowAction::Lost,
        }
    }
}

type CycleResult<A> = Result<(), MotionError<<A as WheelActuator>::Error>>;

/// The behavior state machine.
///
/// Call [`Behavior::tick`] in a loop. Commands come in through the shared [`CommandArbiter`].
pub struct Behavior<'a, M, A, O, C, R, L, S, I>
where
    M: RawMutex,
    A: WheelActuator,
    O: OrientationSensor,
    C: Clock,
    R: RangeSensor,
    L: LineSensorArray,
    S: ServoOutput,
    I: StatusIndicator,
{
    rover: Rover<A, O, C>,
    range: R,
    line: Option<L>,
    servo: Option<S>,
    indicator: I,
    arbiter: &'a CommandArbiter<M>,
    config: BehaviorConfig,
}

impl<'a, M, A, O, C, R, L, S, I> Behavior<'a, M, A, O, C, R, L, S, I>
where
    M: RawMutex,
    A: WheelActuator,
    O: OrientationSensor,
    C: Clock,
    R: RangeSensor,
    L: LineSensorArray,
    S: ServoOutput,
    I: StatusIndicator,
{
    pub fn new(
        rover: Rover<A, O, C>,
        range: R,
        line: Option<L>,
        servo: Option<S>,
        indicator: I,
        arbiter: &'a CommandArbiter<M>,
        config: BehaviorConfig,
    ) -> Self {
        Self {
            rover,
            range,
            line,
            servo,
            indicator,
            arbiter,
            config,
        }
    }

    pub fn rover(&self) -> &Rover<A, O, C> {
        &self.rover
    }

    /// Bring up the motion layer and report which peripherals are missing.
    pub async fn begin(&mut self) -> CycleResult<A> {
        self.rover.begin().await?;
        if self.line.is_none() {
            warn!("No line sensor, LineFinder will drive straight ahead");
        }
        if self.servo.is_none() {
            warn!("No servo driver, gripper commands are ignored");
        }
        Ok(())
    }

    /// One control-loop iteration.
    ///
    /// A pending direct command runs first. A mode change gets its entry action
    /// before the new mode's first cycle. Failures are logged and the cycle is skipped.
    pub async fn tick(&mut self) {
        let cycle = self.arbiter.begin_cycle();

        if let Some(command) = cycle.direct {
            if let Err(e) = self.run_direct(command).await {
                warn!("Direct command {:?} skipped: {}", command, e);
            }
        }

        if cycle.entered {
            self.enter(cycle.mode);
        }

        let result = match cycle.mode {
            Mode::Idle => self.idle(cycle.remote_connected).await,
            Mode::AvoidObstacle => self.avoid_obstacle().await,
            Mode::Follow => self.follow().await,
            Mode::LineFinder => self.line_finder().await,
        };
        if let Err(e) = result {
            warn!("{:?} cycle skipped: {}", cycle.mode, e);
        }
    }

    /// Stop the wheels and forget pending commands.
    pub async fn shutdown(&mut self) -> CycleResult<A> {
        self.arbiter.clear();
        self.rover.stop().await?;
        info!("Rover stopped");
        Ok(())
    }

    fn enter(&mut self, mode: Mode) {
        info!("Mode {:?}", mode);
        self.indicator.set_indicator(mode);
        if mode == Mode::Idle {
            self.arbiter.clear_key();
        }
    }

    async fn pause(&self, period: core::time::Duration) {
        self.rover.clock().sleep(period).await;
    }

    fn write_servo(&mut self, channel: ServoChannel, degrees: u8) {
        match self.servo.as_mut() {
            Some(servo) => {
                if let Err(e) = servo.write_angle(channel, degrees) {
                    warn!("Servo {:?} write failed: {:?}", channel, e);
                }
            }
            None => debug!("No servo for {:?}", channel),
        }
    }

    async fn run_direct(&mut self, command: DirectCommand) -> CycleResult<A> {
        debug!("Direct command {:?}", command);
        let intent = match command {
            DirectCommand::Forward(value) => MotionIntent::forward(speed_from_i32(value)?),
            DirectCommand::Backward(value) => MotionIntent::backward(speed_from_i32(value)?),
            DirectCommand::TurnLeft(value) => {
                MotionIntent::turn(TurnDirection::Left, speed_from_i32(turn_share(value))?)
            }
            DirectCommand::TurnRight(value) => {
                MotionIntent::turn(TurnDirection::Right, speed_from_i32(turn_share(value))?)
            }
            DirectCommand::Stop => {
                self.arbiter.set_cruise_speed(self.config.app_cruise_speed);
                MotionIntent::Stop
            }
            DirectCommand::Servo(channel, value) => {
                let degrees = servo_angle_from_i32(value)?;
                self.write_servo(channel, degrees);
                return Ok(());
            }
            DirectCommand::Pad(button) => match self.pad_intent(button) {
                Some(intent) => intent,
                None => return Ok(()),
            },
            DirectCommand::Move(direction, value) => MotionIntent::Move {
                direction,
                speed: speed_from_i32(value)?,
            },
        };
        self.rover.execute(intent, &Uninterrupted).await?;
        Ok(())
    }

    /// Pad arrows drive at a fixed speed, A to D move the servos to their presets.
    fn pad_intent(&mut self, button: PadButton) -> Option<MotionIntent> {
        let speed = self.config.pad_speed;
        let preset = match button {
            PadButton::Up => return Some(MotionIntent::forward(speed)),
            PadButton::Down => return Some(MotionIntent::backward(speed)),
            PadButton::Left => return Some(MotionIntent::turn(TurnDirection::Left, speed)),
            PadButton::Right => return Some(MotionIntent::turn(TurnDirection::Right, speed)),
            PadButton::Released => return Some(MotionIntent::Stop),
            PadButton::A => 0,
            PadButton::B => 1,
            PadButton::C => 2,
            PadButton::D => 3,
        };
        let (channel, degrees) = self.config.pad_servo_presets[preset];
        self.write_servo(channel, degrees);
        None
    }

    async fn idle(&mut self, remote_connected: bool) -> CycleResult<A> {
        if remote_connected {
            // The app drives through direct commands
            self.pause(self.config.idle_remote_period).await;
            return Ok(());
        }

        let pending = self.arbiter.take_pending();
        let cruise = check_speed(pending.cruise_speed)?;
        let turn_speed = (cruise / 3).max(self.config.manual_turn_floor);
        let intent = match pending.key {
            Some(DirectionKey::Up) => Some(MotionIntent::forward(cruise)),
            Some(DirectionKey::Down) => Some(MotionIntent::backward(cruise)),
            Some(DirectionKey::Left) => Some(MotionIntent::turn(TurnDirection::Left, turn_speed)),
            Some(DirectionKey::Right) => Some(MotionIntent::turn(TurnDirection::Right, turn_speed)),
            Some(DirectionKey::GripperClose) => {
                self.write_servo(ServoChannel::S1, self.config.gripper_closed);
                None
            }
            Some(DirectionKey::GripperOpen) => {
                self.write_servo(ServoChannel::S1, self.config.gripper_open);
                None
            }
            None => Some(MotionIntent::Stop),
        };
        if let Some(intent) = intent {
            self.rover.execute(intent, &Uninterrupted).await?;
        }
        self.pause(self.config.idle_period).await;
        Ok(())
    }

    async fn avoid_obstacle(&mut self) -> CycleResult<A> {
        let distance = self.range.distance_cm().await;
        let speed = self.config.avoid_speed;
        match AvoidAction::classify(distance, &self.config) {
            AvoidAction::Escape => {
                debug!("Obstacle at {:?} cm, backing off", distance);
                let back_off = MotionIntent::Backward {
                    speed,
                    duration: Some(self.config.avoid_reverse_time),
                    straight: false,
                };
                let outcome = self.rover.execute(back_off, self.arbiter).await?;
                if outcome == ManeuverOutcome::Interrupted {
                    return Ok(());
                }
                let turn_away = MotionIntent::TurnRight {
                    speed,
                    duration: Some(self.config.avoid_turn_time),
                };
                self.rover.execute(turn_away, self.arbiter).await?;
            }
            AvoidAction::Cruise => {
                self.rover.execute(MotionIntent::forward(speed), &Uninterrupted).await?;
            }
        }
        self.pause(self.config.avoid_period).await;
        Ok(())
    }

    async fn follow(&mut self) -> CycleResult<A> {
        let distance = self.range.distance_cm().await;
        let speed = self.config.follow_speed;
        let intent = match FollowAction::classify(distance, &self.config) {
            FollowAction::Reverse => MotionIntent::backward(speed),
            FollowAction::Approach => MotionIntent::forward(speed),
            FollowAction::Hold | FollowAction::Lost => MotionIntent::Stop,
        };
        self.rover.execute(intent, &Uninterrupted).await?;
        self.pause(self.config.follow_period).await;
        Ok(())
    }

    async fn line_finder(&mut self) -> CycleResult<A> {
        let pattern = match self.line.as_mut() {
            Some(line) => match line.pattern().await {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!("Line sensor read failed: {:?}", e);
                    self.pause(self.config.line_period).await;
                    return Ok(());
                }
            },
            None => LinePattern::ALL_ON,
        };

        let config = &self.config;
        let (hard, soft) = (config.line_hard_turn_speed, config.line_soft_turn_speed);
        let intent = match LineAction::from_pattern(pattern) {
            LineAction::HardLeft => MotionIntent::turn(TurnDirection::Left, hard),
            LineAction::SoftLeft => MotionIntent::turn(TurnDirection::Left, soft),
            LineAction::HardRight => MotionIntent::turn(TurnDirection::Right, hard),
            LineAction::SoftRight => MotionIntent::turn(TurnDirection::Right, soft),
            LineAction::Reverse => MotionIntent::backward(config.line_reverse_speed),
            LineAction::Forward => MotionIntent::forward(config.line_forward_speed),
        };
        self.rover.execute(intent, &Uninterrupted).await?;
        self.pause(self.config.line_period).await;
        Ok(())
    }
}

/// App turn commands run at two thirds of the sent value.
fn turn_share(value: i32) -> i32 {
    (value as f32 / 1.5) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MotionConfig,
        sim::{RecordingIndicator, RecordingServos, RecordingWheels, SimClock, SimLine, SimRange},
    };
    use core::{cell::Cell, convert::Infallible, time::Duration};
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use high_level_cmds::{
        command::{CommandEvent, PendingCommand},
        peripherals::Absent,
        MoveDirection, WheelSpeedPair,
    };
    use std::rc::Rc;

    type TestBehavior<'a> = Behavior<
        'a,
        NoopRawMutex,
        RecordingWheels,
        Absent,
        SimClock,
        SimRange,
        SimLine,
        RecordingServos,
        RecordingIndicator,
    >;

    struct Rig {
        clock: SimClock,
        wheels: RecordingWheels,
        range: SimRange,
        line: SimLine,
        servos: RecordingServos,
        indicator: RecordingIndicator,
    }

    impl Rig {
        fn new() -> Self {
            let clock = SimClock::default();
            Self {
                wheels: RecordingWheels::new(&clock),
                clock,
                range: SimRange::default(),
                line: SimLine(Rc::new(Cell::new(LinePattern::ALL_ON))),
                servos: RecordingServos::default(),
                indicator: RecordingIndicator::default(),
            }
        }

        fn behavior<'a>(&self, arbiter: &'a CommandArbiter<NoopRawMutex>) -> TestBehavior<'a> {
            let config = MotionConfig::default();
            let rover = Rover::new(self.wheels.clone(), None, self.clock.clone(), config);
            Behavior::new(
                rover,
                self.range.clone(),
                Some(self.line.clone()),
                Some(self.servos.clone()),
                self.indicator.clone(),
                arbiter,
                BehaviorConfig::default(),
            )
        }

        fn indicated(&self) -> Vec<Mode> {
            self.indicator.0.borrow().clone()
        }
    }

    fn sensors(s: [u8; 4]) -> LinePattern {
        LinePattern::from_sensors(s.map(|b| b == 1))
    }

    #[test]
    fn test_line_truth_table() {
        assert_eq!(LineAction::from_pattern(sensors([1, 0, 0, 0])), LineAction::HardLeft);
        assert_eq!(LineAction::from_pattern(sensors([1, 1, 0, 0])), LineAction::SoftLeft);
        assert_eq!(LineAction::from_pattern(sensors([0, 0, 0, 1])), LineAction::HardRight);
        assert_eq!(LineAction::from_pattern(sensors([0, 0, 1, 1])), LineAction::SoftRight);
        assert_eq!(LineAction::from_pattern(sensors([0, 0, 0, 0])), LineAction::Reverse);
        assert_eq!(LineAction::from_pattern(sensors([1, 1, 1, 1])), LineAction::Forward);
        for unmatched in [[0, 1, 0, 0], [0, 1, 1, 0], [1, 0, 0, 1], [1, 1, 1, 0], [0, 1, 1, 1]] {
            assert_eq!(LineAction::from_pattern(sensors(unmatched)), LineAction::Forward);
        }
    }

    #[test]
    fn test_distance_bands() {
        let config = BehaviorConfig::default();
        assert_eq!(AvoidAction::classify(Some(10.0), &config), AvoidAction::Escape);
        assert_eq!(AvoidAction::classify(Some(15.0), &config), AvoidAction::Cruise);
        assert_eq!(AvoidAction::classify(None, &config), AvoidAction::Cruise);

        assert_eq!(FollowAction::classify(Some(10.0), &config), FollowAction::Reverse);
        assert_eq!(FollowAction::classify(Some(20.0), &config), FollowAction::Hold);
        assert_eq!(FollowAction::classify(Some(40.0), &config), FollowAction::Approach);
        assert_eq!(FollowAction::classify(Some(50.0), &config), FollowAction::Lost);
        assert_eq!(FollowAction::classify(None, &config), FollowAction::Lost);
    }

    #[test]
    fn test_entry_action_once_per_transition() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        let mut behavior = rig.behavior(&arbiter);

        block_on(behavior.tick());
        block_on(behavior.tick());
        assert_eq!(rig.indicated(), vec![Mode::Idle]);

        for _ in 0..4 {
            arbiter.submit(CommandEvent::ButtonPressed);
            block_on(behavior.tick());
            block_on(behavior.tick());
        }
        assert_eq!(
            rig.indicated(),
            vec![Mode::Idle, Mode::AvoidObstacle, Mode::Follow, Mode::LineFinder, Mode::Idle]
        );
        assert_eq!(arbiter.mode(), Mode::Idle);
    }

    #[test]
    fn test_avoid_backs_off_from_close_obstacle() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        arbiter.set_mode(Mode::AvoidObstacle);
        let mut behavior = rig.behavior(&arbiter);

        rig.range.0.set(Some(10.0));
        block_on(behavior.tick());
        assert_eq!(
            rig.wheels.speeds(),
            vec![(-30, -30), (-50, -50), (0, 0), (30, -30), (50, -50), (0, 0)]
        );
        assert_eq!(rig.indicated(), vec![Mode::AvoidObstacle]);
    }

    /// Selects `mode` as soon as both wheels are driven backward.
    struct SwitchOnReverse<'a> {
        wheels: RecordingWheels,
        arbiter: &'a CommandArbiter<NoopRawMutex>,
        mode: Mode,
    }

    impl WheelActuator for SwitchOnReverse<'_> {
        type Error = Infallible;

        fn set_wheel_duty(&mut self, speeds: WheelSpeedPair) -> Result<(), Self::Error> {
            if speeds.left() < 0 && speeds.right() < 0 {
                self.arbiter.set_mode(self.mode);
            }
            self.wheels.set_wheel_duty(speeds)
        }
    }

    #[test]
    fn test_mode_change_cuts_escape_short() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::<NoopRawMutex>::new(100);
        arbiter.set_mode(Mode::AvoidObstacle);
        let wheels = SwitchOnReverse {
            wheels: rig.wheels.clone(),
            arbiter: &arbiter,
            mode: Mode::Follow,
        };
        let rover = Rover::new(wheels, None::<Absent>, rig.clock.clone(), MotionConfig::default());
        let mut behavior = Behavior::new(
            rover,
            rig.range.clone(),
            Some(rig.line.clone()),
            Some(rig.servos.clone()),
            rig.indicator.clone(),
            &arbiter,
            BehaviorConfig::default(),
        );

        rig.range.0.set(Some(10.0));
        block_on(behavior.tick());
        // Back-off stopped at its first check, the turn away never started
        assert_eq!(rig.wheels.speeds(), vec![(-30, -30), (-50, -50), (0, 0)]);
        assert!(rig.clock.elapsed() < BehaviorConfig::default().avoid_reverse_time);

        block_on(behavior.tick());
        assert_eq!(rig.indicated(), vec![Mode::AvoidObstacle, Mode::Follow]);
    }

    #[test]
    fn test_avoid_cruises_when_clear() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        arbiter.set_mode(Mode::AvoidObstacle);
        let mut behavior = rig.behavior(&arbiter);

        rig.range.0.set(Some(100.0));
        block_on(behavior.tick());
        assert_eq!(rig.wheels.speeds(), vec![(30, 30), (50, 50)]);
    }

    #[test]
    fn test_follow_keeps_distance() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        arbiter.set_mode(Mode::Follow);
        let mut behavior = rig.behavior(&arbiter);

        for (distance, expected) in [
            (Some(10.0), (-50, -50)),
            (Some(20.0), (0, 0)),
            (Some(40.0), (50, 50)),
            (Some(80.0), (0, 0)),
            (None, (0, 0)),
        ] {
            rig.range.0.set(distance);
            block_on(behavior.tick());
            assert_eq!(rig.wheels.last(), Some(expected), "at {:?} cm", distance);
        }
    }

    #[test]
    fn test_line_finder_follows_pattern() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        arbiter.set_mode(Mode::LineFinder);
        let mut behavior = rig.behavior(&arbiter);

        for (pattern, expected) in [
            ([1, 0, 0, 0], (-50, 50)),
            ([0, 0, 1, 1], (30, -30)),
            ([0, 0, 0, 0], (-20, -20)),
            ([1, 1, 1, 1], (25, 25)),
        ] {
            rig.line.0.set(sensors(pattern));
            block_on(behavior.tick());
            assert_eq!(rig.wheels.last(), Some(expected), "for {:?}", pattern);
        }
    }

    #[test]
    fn test_missing_peripherals() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::<NoopRawMutex>::new(100);
        arbiter.set_mode(Mode::LineFinder);
        let config = MotionConfig::default();
        let rover = Rover::new(rig.wheels.clone(), None::<Absent>, rig.clock.clone(), config);
        let mut behavior = Behavior::new(
            rover,
            rig.range.clone(),
            None::<Absent>,
            None::<Absent>,
            rig.indicator.clone(),
            &arbiter,
            BehaviorConfig::default(),
        );

        block_on(behavior.begin()).unwrap();
        block_on(behavior.tick());
        // No servo to move, LineFinder keeps driving straight ahead
        arbiter.submit(CommandEvent::Direct(DirectCommand::Servo(ServoChannel::S1, 90)));
        block_on(behavior.tick());
        assert_eq!(rig.wheels.speeds(), vec![(0, 0), (25, 25), (25, 25)]);
    }

    #[test]
    fn test_idle_runs_manual_keys() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        let mut behavior = rig.behavior(&arbiter);
        block_on(behavior.tick());

        arbiter.push_command(PendingCommand {
            key: Some(DirectionKey::Up),
            cruise_speed: 60,
        });
        block_on(behavior.tick());
        assert_eq!(rig.wheels.last(), Some((60, 60)));

        // A third of 30 is under the floor
        arbiter.push_command(PendingCommand {
            key: Some(DirectionKey::Left),
            cruise_speed: 30,
        });
        block_on(behavior.tick());
        assert_eq!(rig.wheels.last(), Some((-20, 20)));

        arbiter.push_command(PendingCommand {
            key: Some(DirectionKey::Right),
            cruise_speed: 90,
        });
        block_on(behavior.tick());
        assert_eq!(rig.wheels.last(), Some((30, -30)));

        // Nothing pending: stop
        block_on(behavior.tick());
        assert_eq!(rig.wheels.last(), Some((0, 0)));
    }

    #[test]
    fn test_idle_gripper_keys() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        let mut behavior = rig.behavior(&arbiter);
        block_on(behavior.tick());

        arbiter.submit(CommandEvent::DirectionKey(DirectionKey::GripperClose));
        block_on(behavior.tick());
        arbiter.submit(CommandEvent::DirectionKey(DirectionKey::GripperOpen));
        block_on(behavior.tick());
        assert_eq!(
            *rig.servos.0.borrow(),
            vec![(ServoChannel::S1, 20), (ServoChannel::S1, 90)]
        );
    }

    #[test]
    fn test_entering_idle_drops_stale_key() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        arbiter.set_mode(Mode::Follow);
        let mut behavior = rig.behavior(&arbiter);
        block_on(behavior.tick());

        arbiter.submit(CommandEvent::DirectionKey(DirectionKey::Up));
        arbiter.submit(CommandEvent::ModeSelect(Mode::Idle));
        block_on(behavior.tick());
        assert!(rig.wheels.speeds().iter().all(|s| *s == (0, 0)));
    }

    #[test]
    fn test_idle_yields_to_connected_remote() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        let mut behavior = rig.behavior(&arbiter);
        block_on(behavior.tick());
        let writes = rig.wheels.speeds().len();
        let before = rig.clock.elapsed();

        arbiter.submit(CommandEvent::RemoteSession(true));
        arbiter.submit(CommandEvent::DirectionKey(DirectionKey::Up));
        block_on(behavior.tick());
        assert_eq!(rig.wheels.speeds().len(), writes);
        assert_eq!(rig.clock.elapsed() - before, Duration::from_millis(500));
    }

    #[test]
    fn test_direct_commands_act_in_any_mode() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        arbiter.set_mode(Mode::Follow);
        let mut behavior = rig.behavior(&arbiter);

        arbiter.submit(CommandEvent::Direct(DirectCommand::Forward(40)));
        block_on(behavior.tick());
        // Then Follow sees nothing in range and stops
        assert_eq!(rig.wheels.speeds(), vec![(30, 30), (40, 40), (0, 0)]);

        arbiter.submit(CommandEvent::Direct(DirectCommand::TurnRight(45)));
        block_on(behavior.tick());
        assert!(rig.wheels.speeds().contains(&(30, -30)));

        arbiter.submit(CommandEvent::Direct(DirectCommand::Servo(ServoChannel::S2, 45)));
        block_on(behavior.tick());
        arbiter.submit(CommandEvent::Direct(DirectCommand::Servo(ServoChannel::S2, 200)));
        block_on(behavior.tick());
        assert_eq!(*rig.servos.0.borrow(), vec![(ServoChannel::S2, 45)]);
    }

    #[test]
    fn test_app_pad_buttons() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        let mut behavior = rig.behavior(&arbiter);
        arbiter.submit(CommandEvent::RemoteSession(true));

        let mut press = |message| {
            let button = PadButton::from_message(message);
            arbiter.submit(CommandEvent::Direct(DirectCommand::Pad(button)));
            block_on(behavior.tick());
            rig.wheels.last()
        };
        assert_eq!(press("!B516"), Some((50, 50)));
        assert_eq!(press("!B714"), Some((-50, 50)));
        assert_eq!(press("!B615"), Some((-50, -50)));
        assert_eq!(press("!B814"), Some((50, -50)));
        assert_eq!(press("!B507"), Some((0, 0)));
        for preset in ["!B11:", "!B219", "!B318", "!B417"] {
            press(preset);
        }

        assert_eq!(
            *rig.servos.0.borrow(),
            vec![
                (ServoChannel::S1, 0),
                (ServoChannel::S2, 90),
                (ServoChannel::S2, 0),
                (ServoChannel::S1, 90),
            ]
        );
        // A pad release is a plain stop and keeps the cruise speed
        assert_eq!(arbiter.take_pending().cruise_speed, 100);
    }

    #[test]
    fn test_app_move_directions() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        let mut behavior = rig.behavior(&arbiter);
        arbiter.submit(CommandEvent::RemoteSession(true));

        arbiter.submit(CommandEvent::Direct(DirectCommand::Move(MoveDirection::NorthEast, 60)));
        block_on(behavior.tick());
        assert_eq!(rig.wheels.last(), Some((60, 30)));

        arbiter.submit(CommandEvent::Direct(DirectCommand::Move(MoveDirection::SouthWest, 60)));
        block_on(behavior.tick());
        assert_eq!(rig.wheels.last(), Some((-30, -60)));

        let writes = rig.wheels.speeds().len();
        arbiter.submit(CommandEvent::Direct(DirectCommand::Move(MoveDirection::North, 150)));
        block_on(behavior.tick());
        assert_eq!(rig.wheels.speeds().len(), writes);
    }

    #[test]
    fn test_direct_stop_resets_cruise_speed() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        arbiter.set_mode(Mode::Follow);
        let mut behavior = rig.behavior(&arbiter);

        arbiter.submit(CommandEvent::Direct(DirectCommand::Stop));
        block_on(behavior.tick());
        assert_eq!(arbiter.take_pending().cruise_speed, 80);
    }

    #[test]
    fn test_invalid_direct_command_is_skipped() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        arbiter.set_mode(Mode::Follow);
        let mut behavior = rig.behavior(&arbiter);

        arbiter.submit(CommandEvent::Direct(DirectCommand::Backward(250)));
        block_on(behavior.tick());
        assert_eq!(rig.wheels.speeds(), vec![(0, 0)]);
    }

    #[test]
    fn test_shutdown_stops_and_clears() {
        let rig = Rig::new();
        let arbiter = CommandArbiter::new(100);
        arbiter.set_mode(Mode::AvoidObstacle);
        let mut behavior = rig.behavior(&arbiter);
        block_on(behavior.tick());

        arbiter.submit(CommandEvent::DirectionKey(DirectionKey::Up));
        block_on(behavior.shutdown()).unwrap();
        assert_eq!(rig.wheels.last(), Some((0, 0)));
        assert_eq!(arbiter.take_pending().key, None);
        assert!(behavior.rover().wheel_speeds().is_stopped());
    }
}
