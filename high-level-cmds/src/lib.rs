#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

pub mod command;
pub mod peripherals;

use core::{
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

/// Operating mode of the rover. Exactly one is active at a time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    /// Wait for manual commands.
    #[default]
    Idle,
    /// Drive forward, back off and turn away when something is close.
    AvoidObstacle,
    /// Keep the thing in front within a distance band.
    Follow,
    /// Track a dark line with the line-sensor array.
    LineFinder,
}

impl Mode {
    /// The mode that the physical button switches to from this one.
    pub fn next(self) -> Self {
        match self {
            Mode::Idle => Mode::AvoidObstacle,
            Mode::AvoidObstacle => Mode::Follow,
            Mode::Follow => Mode::LineFinder,
            Mode::LineFinder => Mode::Idle,
        }
    }

    /// Indicator color shown while this mode is active.
    pub fn color(self) -> Rgb {
        match self {
            Mode::Idle => Rgb(0xff, 0x00, 0x00),
            Mode::AvoidObstacle => Rgb(0x00, 0x00, 0xff),
            Mode::Follow => Rgb(0xff, 0x00, 0xff),
            Mode::LineFinder => Rgb(0xff, 0xff, 0xff),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Which way a pivot turn goes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TurnDirection {
    Left,
    Right,
}

/// One of eight directions for [`MotionIntent::Move`], counter-clockwise from
/// "pivot right" (0 degrees) in 45 degree steps. North is straight ahead.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MoveDirection {
    East,
    NorthEast,
    North,
    NorthWest,
    West,
    SouthWest,
    South,
    SouthEast,
}

impl MoveDirection {
    const ALL: [MoveDirection; 8] = [
        MoveDirection::East,
        MoveDirection::NorthEast,
        MoveDirection::North,
        MoveDirection::NorthWest,
        MoveDirection::West,
        MoveDirection::SouthWest,
        MoveDirection::South,
        MoveDirection::SouthEast,
    ];

    /// Directions are numbered 1 (east) to 8 (south-east).
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get((index as usize).checked_sub(1)?).copied()
    }
}

/// Signed duty for the left and right wheel, in percent.
///
/// Both values always lie in `-100..=100`. Positive means the wheel rotates forward.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct WheelSpeedPair {
    left: i8,
    right: i8,
}

impl WheelSpeedPair {
    pub const STOPPED: Self = Self { left: 0, right: 0 };
    pub const MAX: i32 = 100;

    /// Builds a pair, clamping both sides into the valid duty range.
    pub fn new(left: i32, right: i32) -> Self {
        Self {
            left: left.clamp(-Self::MAX, Self::MAX) as i8,
            right: right.clamp(-Self::MAX, Self::MAX) as i8,
        }
    }

    /// Same as [`WheelSpeedPair::new`], truncating fractional speeds toward zero.
    /// NaN is treated as zero.
    pub fn from_f32(left: f32, right: f32) -> Self {
        Self::new(left as i32, right as i32)
    }

    /// Both wheels at the same signed speed.
    pub fn uniform(speed: i32) -> Self {
        Self::new(speed, speed)
    }

    /// Wheels at equal magnitude and opposite sign.
    pub fn pivot(direction: TurnDirection, speed: i32) -> Self {
        match direction {
            TurnDirection::Right => Self::new(speed, -speed),
            TurnDirection::Left => Self::new(-speed, speed),
        }
    }

    /// Wheel mix for an 8-way move. East and west pivot at half speed, the
    /// diagonals arc with the inner wheel at half speed.
    pub fn toward(direction: MoveDirection, speed: i32) -> Self {
        let half = speed / 2;
        match direction {
            MoveDirection::East => Self::pivot(TurnDirection::Right, half),
            MoveDirection::NorthEast => Self::new(speed, half),
            MoveDirection::North => Self::uniform(speed),
            MoveDirection::NorthWest => Self::new(half, speed),
            MoveDirection::West => Self::pivot(TurnDirection::Left, half),
            MoveDirection::SouthWest => Self::new(-half, -speed),
            MoveDirection::South => Self::uniform(-speed),
            MoveDirection::SouthEast => Self::new(-speed, -half),
        }
    }

    pub fn left(&self) -> i8 {
        self.left
    }

    pub fn right(&self) -> i8 {
        self.right
    }

    pub fn is_stopped(&self) -> bool {
        self.left == 0 && self.right == 0
    }
}

/// Enum represents what motion to execute.
///
/// Speeds are percentages; anything above 100 is refused by the controllers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MotionIntent {
    /// Drive forward. Without a duration, keep driving after returning.
    /// Heading hold only runs for timed drives.
    Forward {
        speed: u8,
        duration: Option<Duration>,
        straight: bool,
    },

    /// Drive backward, see [`MotionIntent::Forward`].
    Backward {
        speed: u8,
        duration: Option<Duration>,
        straight: bool,
    },

    /// Pivot left in place.
    TurnLeft {
        speed: u8,
        duration: Option<Duration>,
    },

    /// Pivot right in place.
    TurnRight {
        speed: u8,
        duration: Option<Duration>,
    },

    /// Pivot until the heading changed by `angle` degrees.
    TurnToAngle {
        angle: f32,
        direction: TurnDirection,
        speed: u8,
    },

    /// Drive or arc toward one of eight directions and keep going.
    Move { direction: MoveDirection, speed: u8 },

    /// Release both wheels.
    Stop,
}

impl MotionIntent {
    pub fn forward(speed: u8) -> Self {
        MotionIntent::Forward {
            speed,
            duration: None,
            straight: false,
        }
    }

    pub fn backward(speed: u8) -> Self {
        MotionIntent::Backward {
            speed,
            duration: None,
            straight: false,
        }
    }

    pub fn turn(direction: TurnDirection, speed: u8) -> Self {
        match direction {
            TurnDirection::Left => MotionIntent::TurnLeft {
                speed,
                duration: None,
            },
            TurnDirection::Right => MotionIntent::TurnRight {
                speed,
                duration: None,
            },
        }
    }
}

/// The 4-channel line-sensor reading. Bit 0 is the outer-left sensor,
/// bit 3 the outer-right one. A set bit means the sensor sees the line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinePattern(u8);

impl LinePattern {
    pub const ALL_ON: Self = Self(0b1111);
    pub const ALL_OFF: Self = Self(0b0000);

    /// Only the low four bits are kept.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1111)
    }

    /// Sensors listed left to right.
    pub fn from_sensors(sensors: [bool; 4]) -> Self {
        Self(
            sensors
                .iter()
                .enumerate()
                .fold(0, |acc, (i, &on)| acc | ((on as u8) << i)),
        )
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Sensors listed left to right.
    pub fn sensors(&self) -> [bool; 4] {
        core::array::from_fn(|i| self.0 & (1 << i) != 0)
    }
}

/// A moment on the monotonic clock, counted from an arbitrary start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Instant(Duration);

impl Instant {
    pub const fn from_duration(since_start: Duration) -> Self {
        Self(since_start)
    }

    pub fn into_inner(self) -> Duration {
        self.0
    }

    /// Time passed since `earlier`, or zero if `earlier` is actually later.
    pub fn saturating_since(self, earlier: Instant) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Sub for Instant {
    type Output = Duration;
    fn sub(self, other: Self) -> Self::Output {
        self.0 - other.0
    }
}

impl Add<Duration> for Instant {
    type Output = Self;
    fn add(self, other: Duration) -> Self::Output {
        Self(self.0.saturating_add(other))
    }
}

/// This trait provides the basic timing utilities from the async runtime.
pub trait Clock {
    /// The current monotonic time.
    fn now(&self) -> Instant;

    /// This function creates a task that will sleep for the given duration.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}
