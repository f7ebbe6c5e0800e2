//! A differential-drive rover on a flat floor.
//!
//! The rover starts at the origin facing +x. There is a wall across the x axis at
//! `wall_x` and a dark line painted along y = 0.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

/// PWM duty counts per period, shared with the drivers.
pub const PWM_PERIOD: u16 = 1023;

#[derive(Debug, Clone, Copy)]
pub struct PlantConfig {
    /// Wheel surface speed at full duty, cm/s.
    pub top_speed: f64,
    /// Distance between the wheels, cm.
    pub track: f64,
    pub wall_x: f64,
    /// Echoes from further away are lost, cm.
    pub sonar_range: f64,
    pub line_width: f64,
    /// Spacing of the line sensors across the array, cm.
    pub sensor_pitch: f64,
    /// Distance from the axle forward to the line sensors, cm.
    pub sensor_offset: f64,
    /// Constant gyro bias, degrees per second.
    pub gyro_drift: f64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            top_speed: 60.0,
            track: 12.0,
            wall_x: 150.0,
            sonar_range: 400.0,
            line_width: 2.0,
            sensor_pitch: 1.5,
            sensor_offset: 6.0,
            gyro_drift: 0.3,
        }
    }
}

/// One of the PWM outputs wired to the plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmLine {
    /// H-bridge inputs: left pair 0 and 1, right pair 2 and 3.
    Bridge(usize),
    Servo(usize),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Degrees, counter-clockwise, not wrapped.
    pub heading: f64,
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={:.1} cm y={:.1} cm heading={:.1} deg", self.x, self.y, self.heading)
    }
}

struct PlantState {
    pose: Pose,
    bridge: [u16; 4],
    servo: [u16; 2],
    updated: Duration,
}

pub struct Plant {
    config: PlantConfig,
    start: Instant,
    state: Mutex<PlantState>,
}

pub type SharedPlant = Arc<Plant>;

impl Plant {
    pub fn new(config: PlantConfig) -> SharedPlant {
        Arc::new(Self {
            config,
            start: Instant::now(),
            state: Mutex::new(PlantState {
                pose: Pose::default(),
                bridge: [0; 4],
                servo: [0; 2],
                updated: Duration::ZERO,
            }),
        })
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Lock the state after moving the rover up to now.
    fn advance(&self) -> MutexGuard<'_, PlantState> {
        let now = self.elapsed();
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dt = now.saturating_sub(state.updated).as_secs_f64();
        state.updated = now;

        // The right motor is mounted mirrored, so its forward line is the second one.
        let left = wheel_fraction(state.bridge[0], state.bridge[1]) * self.config.top_speed;
        let right = wheel_fraction(state.bridge[3], state.bridge[2]) * self.config.top_speed;
        let v = (left + right) / 2.0;
        let omega = ((right - left) / self.config.track).to_degrees();

        let pose = &mut state.pose;
        let mid = (pose.heading + omega * dt / 2.0).to_radians();
        pose.x = (pose.x + v * mid.cos() * dt).min(self.config.wall_x);
        pose.y += v * mid.sin() * dt;
        pose.heading += omega * dt;
        state
    }

    pub fn set_pwm(&self, line: PwmLine, duty: u16) {
        let mut state = self.advance();
        match line {
            PwmLine::Bridge(i) => state.bridge[i] = duty,
            PwmLine::Servo(i) => state.servo[i] = duty,
        }
    }

    pub fn pose(&self) -> Pose {
        self.advance().pose
    }

    pub fn servo_duty(&self) -> [u16; 2] {
        self.state.lock().map(|s| s.servo).unwrap_or_default()
    }

    /// Heading as a biased gyro would integrate it.
    pub fn gyro_heading(&self) -> f64 {
        let pose = self.pose();
        pose.heading + self.config.gyro_drift * self.elapsed().as_secs_f64()
    }

    /// Distance along the heading to the wall, if an echo would come back.
    pub fn range(&self) -> Option<f64> {
        let pose = self.pose();
        let along = pose.heading.to_radians().cos();
        if along < 1e-3 {
            return None;
        }
        let distance = (self.config.wall_x - pose.x) / along;
        (distance <= self.config.sonar_range).then_some(distance)
    }

    /// Line sensors left to right, bit 0 being the leftmost.
    pub fn line_bits(&self) -> u8 {
        let pose = self.pose();
        let (sin, cos) = pose.heading.to_radians().sin_cos();
        (0..4).fold(0, |bits, i| {
            // Left of the rover is +y when facing +x
            let lateral = (1.5 - i as f64) * self.config.sensor_pitch;
            let y = pose.y + self.config.sensor_offset * sin + lateral * cos;
            let on_line = y.abs() <= self.config.line_width / 2.0;
            bits | ((on_line as u8) << i)
        })
    }
}

fn wheel_fraction(forward: u16, backward: u16) -> f64 {
    (forward as f64 - backward as f64) / PWM_PERIOD as f64
}
