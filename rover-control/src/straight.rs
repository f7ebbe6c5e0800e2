//! Heading correction while driving straight.

use high_level_cmds::WheelSpeedPair;
use libm::{fabs, fmod};

use crate::config::MotionConfig;

/// Fold an accumulated heading difference into `(-180, 180]` degrees.
pub fn normalize_deviation(degrees: f64) -> f64 {
    let folded = fmod(degrees, 360.0);
    if folded > 180.0 {
        folded - 360.0
    } else if folded <= -180.0 {
        folded + 360.0
    } else {
        folded
    }
}

/// What to do with the wheels after looking at the heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Deviation inside the dead-band: keep the current speeds.
    Keep,
    /// Bias the wheels proportionally to the deviation.
    Steer(WheelSpeedPair),
    /// Deviation too large: pivot back briefly, then steer.
    Pulse {
        pulse: WheelSpeedPair,
        steer: WheelSpeedPair,
    },
}

/// Proportional heading hold around the heading at the start of the drive.
#[derive(Debug, Clone, Copy)]
pub struct HeadingHold {
    speed: f64,
    reference: f64,
    dead_band: f64,
    hard_threshold: f64,
    gain: f64,
    pulse_speed: i32,
}

impl HeadingHold {
    /// `speed` is signed: negative drives backward.
    pub fn new(speed: i32, reference: f64, config: &MotionConfig) -> Self {
        Self {
            speed: speed as f64,
            reference,
            dead_band: config.straight_dead_band,
            hard_threshold: config.straight_hard_threshold,
            gain: config.straight_gain,
            pulse_speed: config.straight_pulse_speed,
        }
    }

    /// Speeds for driving with no deviation.
    pub fn cruise(&self) -> WheelSpeedPair {
        WheelSpeedPair::uniform(self.speed as i32)
    }

    /// Deviation from the reference. Positive means the rover drifted counter-clockwise.
    pub fn deviation(&self, heading: f64) -> f64 {
        normalize_deviation(heading - self.reference)
    }

    pub fn correction(&self, heading: f64) -> Correction {
        let z = self.deviation(heading);
        if fabs(z) <= self.dead_band {
            return Correction::Keep;
        }

        // A counter-clockwise drift is undone by speeding up the left wheel.
        // This holds in reverse too, since both speeds are negative then.
        let bias = z * self.gain;
        let steer =
            WheelSpeedPair::from_f32((self.speed + bias) as f32, (self.speed - bias) as f32);
        if fabs(z) > self.hard_threshold {
            let sign = if z > 0.0 { 1 } else { -1 };
            let pulse = WheelSpeedPair::new(self.pulse_speed * sign, -self.pulse_speed * sign);
            Correction::Pulse { pulse, steer }
        } else {
            Correction::Steer(steer)
        }
    }
}
