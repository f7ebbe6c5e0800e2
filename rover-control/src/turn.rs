//! Adaptive pivot turn by a given angle.
//!
//! The motors keep turning for a while after the speed changes, so a fixed-speed
//! turn either crawls or overshoots. This controller starts at a moderate speed,
//! speeds up while the turn is sluggish and brakes early when the rover turns
//! fast or gets close to the target.

use core::time::Duration;

use high_level_cmds::Instant;
use libm::{ceil, roundf};

use crate::config::TurnConfig;

/// Time allowed for a turn: `timeout_per_revolution` for every started revolution.
pub fn turn_timeout(angle: f64, per_revolution: Duration) -> Duration {
    let revolutions = ceil(angle / 360.0).max(1.0) as u32;
    per_revolution.saturating_mul(revolutions)
}

/// Result of feeding one heading sample to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStep {
    /// Keep the wheels as they are.
    Hold,
    /// Pivot at this speed from now on.
    SetSpeed(u8),
    /// Close enough to the target.
    Reached,
    /// Ran out of time.
    TimedOut,
}

fn whole(speed: f32) -> u8 {
    roundf(speed) as u8
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    turned: f64,
}

impl Sample {
    /// Degrees per second from `earlier` to `self`. `None` if no time passed.
    fn rate_since(&self, earlier: &Sample) -> Option<f64> {
        let dt = self.at.saturating_since(earlier.at);
        if dt.is_zero() {
            return None;
        }
        Some((self.turned - earlier.turned) / dt.as_secs_f64())
    }
}

#[derive(Debug, Clone)]
pub struct TurnToAngle {
    config: TurnConfig,
    target: f64,
    ceiling: f32,
    floor: f32,
    speed: f32,
    deadline: Instant,
    previous: Sample,
    last_change: Sample,
}

impl TurnToAngle {
    /// Plan a turn by `target` degrees starting at `start`.
    ///
    /// `requested_speed` is the speed ceiling; it is further limited to the configured maximum.
    pub fn new(target: f64, requested_speed: u8, start: Instant, config: &TurnConfig) -> Self {
        let ceiling = requested_speed.min(config.max_speed);
        let initial = if target < config.small_angle as f64 {
            ceiling.min(config.small_angle_speed)
        } else {
            ceiling
        };
        let origin = Sample {
            at: start,
            turned: 0.0,
        };
        Self {
            config: *config,
            target,
            ceiling: ceiling as f32,
            floor: config.floor_speed.min(ceiling) as f32,
            speed: initial as f32,
            deadline: start + turn_timeout(target, config.timeout_per_revolution),
            previous: origin,
            last_change: origin,
        }
    }

    /// The pivot speed the wheels should currently run at.
    pub fn speed(&self) -> u8 {
        whole(self.speed)
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Feed the angle turned so far (absolute, in degrees) at time `now`.
    pub fn step(&mut self, now: Instant, turned: f64) -> TurnStep {
        if turned + self.config.tolerance >= self.target {
            return TurnStep::Reached;
        }
        if now >= self.deadline {
            return TurnStep::TimedOut;
        }

        let sample = Sample { at: now, turned };
        let Some(rate) = sample.rate_since(&self.previous) else {
            return TurnStep::Hold;
        };
        let progress = turned - self.previous.turned;
        let to_target = self.target - turned;
        let since_change = now.saturating_since(self.last_change.at);
        let rate_since_change = sample.rate_since(&self.last_change).unwrap_or(rate);
        self.previous = sample;

        let next = if to_target < self.config.near_target {
            Some(self.floor)
        } else if rate > self.config.fast_rate {
            // The bigger the share of the remaining angle covered in one tick, the harder we brake.
            let braked = self.speed - (self.speed - self.floor) * (progress / to_target) as f32;
            Some(braked.max(self.floor))
        } else if rate <= self.config.regular_rate
            && rate_since_change < self.config.slow_rate
            && since_change > self.config.adjust_cooldown
            && self.speed < self.ceiling
        {
            Some((self.speed + self.config.speed_step as f32).min(self.ceiling))
        } else {
            None
        };

        match next {
            Some(speed) if whole(speed) != whole(self.speed) => {
                self.speed = speed;
                self.last_change = sample;
                TurnStep::SetSpeed(self.speed())
            }
            Some(speed) => {
                self.speed = speed;
                TurnStep::Hold
            }
            None => TurnStep::Hold,
        }
    }
}
