//! Tuning values for the motion controllers and the behaviors.
//!
//! Every number here was tuned by hand on the reference rover (small TT gear
//! motors on a 6 V pack, MPU6050 gyro). None of them is derived from first
//! principles: recalibrate on new hardware instead of trusting them.

use core::time::Duration;

use high_level_cmds::command::ServoChannel;

/// Wheel-speed smoothing and straight-line driving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionConfig {
    /// Period of every closed-loop controller and of cancellable waits.
    pub control_tick: Duration,

    /// How long [`stop`](crate::smoother::WheelSpeedSmoother::stop) waits for the
    /// motors to release.
    pub stop_settle: Duration,

    /// A speed change larger than this on both wheels at once goes through an intermediate step.
    pub ramp_threshold: i32,
    /// Magnitude of the intermediate step.
    pub ramp_speed: i32,
    /// How long the intermediate step is held.
    pub ramp_settle: Duration,

    /// Wait between zeroing the wheels and taking the heading reference of a straight drive.
    pub straight_start_settle: Duration,
    /// Heading deviation (degrees) that is left alone.
    pub straight_dead_band: f64,
    /// Above this deviation (degrees) a counter-rotation pulse is applied first.
    pub straight_hard_threshold: f64,
    /// Speed points of correction per degree of deviation.
    pub straight_gain: f64,
    /// Pivot speed of the counter-rotation pulse.
    pub straight_pulse_speed: i32,
    /// How long the counter-rotation pulse is held.
    pub straight_pulse_hold: Duration,

    pub turn: TurnConfig,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            control_tick: Duration::from_millis(10),
            stop_settle: Duration::from_millis(20),
            ramp_threshold: 30,
            ramp_speed: 30,
            ramp_settle: Duration::from_millis(200),
            straight_start_settle: Duration::from_millis(100),
            straight_dead_band: 0.2,
            straight_hard_threshold: 10.0,
            straight_gain: 3.0,
            straight_pulse_speed: 30,
            straight_pulse_hold: Duration::from_millis(10),
            turn: TurnConfig::default(),
        }
    }
}

/// Turn-to-angle controller.
///
/// Rates are in degrees per second. At the default speeds the motors and gearbox
/// keep turning for about 100 ms after the command changes, which is what the
/// rate bands compensate for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnConfig {
    /// Highest pivot speed at which the turn can still stop on target.
    pub max_speed: u8,
    /// Speed never goes below this while braking.
    pub floor_speed: u8,
    /// Targets below this angle start at `small_angle_speed`.
    pub small_angle: f32,
    pub small_angle_speed: u8,
    /// How much a sluggish turn is sped up at once.
    pub speed_step: u8,
    /// The turn is done when it is this close (degrees) to the target.
    pub tolerance: f64,
    /// Closer than this to the target, always run at `floor_speed`.
    pub near_target: f64,
    /// Turning faster than this risks overshooting, so brake.
    pub fast_rate: f64,
    /// Turning slower than this can be sped up.
    pub regular_rate: f64,
    /// Progress since the last speed change slower than this counts as stalling.
    pub slow_rate: f64,
    /// Minimum time between two speed increases.
    pub adjust_cooldown: Duration,
    /// Time allowed for each started full revolution of the target angle.
    pub timeout_per_revolution: Duration,
    /// Assumed pivot rate when there is no gyro and the turn runs on a timer.
    pub open_loop_rate: f64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_speed: 15,
            floor_speed: 10,
            small_angle: 30.0,
            small_angle_speed: 10,
            speed_step: 5,
            tolerance: 2.0,
            near_target: 15.0,
            fast_rate: 400.0,
            regular_rate: 150.0,
            slow_rate: 30.0,
            adjust_cooldown: Duration::from_millis(100),
            timeout_per_revolution: Duration::from_secs(3),
            open_loop_rate: 90.0,
        }
    }
}

/// Cruise speed until a speed level is picked.
pub const DEFAULT_CRUISE_SPEED: u8 = 100;

/// Behavior state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BehaviorConfig {
    /// Cruise speed after the app sends a stop.
    pub app_cruise_speed: u8,
    /// Manual turns run at a third of cruise speed, but never slower than this.
    pub manual_turn_floor: u8,
    /// Gripper servo angles.
    pub gripper_closed: u8,
    pub gripper_open: u8,

    /// Drive and turn speed of the app's control pad.
    pub pad_speed: u8,
    /// Servo positions set by the pad buttons A to D.
    pub pad_servo_presets: [(ServoChannel, u8); 4],

    /// Wait between two Idle cycles.
    pub idle_period: Duration,
    /// Wait between two Idle cycles while the app is connected.
    pub idle_remote_period: Duration,

    /// Obstacles closer than this (cm) make the rover back off.
    pub near_distance: f64,
    pub avoid_speed: u8,
    pub avoid_reverse_time: Duration,
    pub avoid_turn_time: Duration,
    /// Wait between two range readings while avoiding.
    pub avoid_period: Duration,

    /// Follow stands still between `near_distance` and this (cm)...
    pub follow_hold_distance: f64,
    /// ...drives up to the target until this (cm), and ignores anything further.
    pub follow_far_distance: f64,
    pub follow_speed: u8,
    pub follow_period: Duration,

    pub line_hard_turn_speed: u8,
    pub line_soft_turn_speed: u8,
    pub line_reverse_speed: u8,
    pub line_forward_speed: u8,
    pub line_period: Duration,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            app_cruise_speed: 80,
            manual_turn_floor: 20,
            gripper_closed: 20,
            gripper_open: 90,
            pad_speed: 50,
            pad_servo_presets: [
                (ServoChannel::S1, 0),
                (ServoChannel::S2, 90),
                (ServoChannel::S2, 0),
                (ServoChannel::S1, 90),
            ],
            idle_period: Duration::from_millis(100),
            idle_remote_period: Duration::from_millis(500),
            near_distance: 15.0,
            avoid_speed: 50,
            avoid_reverse_time: Duration::from_millis(500),
            avoid_turn_time: Duration::from_millis(250),
            avoid_period: Duration::from_millis(20),
            follow_hold_distance: 30.0,
            follow_far_distance: 50.0,
            follow_speed: 50,
            follow_period: Duration::from_millis(50),
            line_hard_turn_speed: 50,
            line_soft_turn_speed: 30,
            line_reverse_speed: 20,
            line_forward_speed: 25,
            line_period: Duration::from_millis(10),
        }
    }
}
