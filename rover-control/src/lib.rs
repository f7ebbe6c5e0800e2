#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

pub mod arbiter;
pub mod behavior;
pub mod config;
pub mod error;
pub mod rover;
pub mod smoother;
pub mod straight;
pub mod turn;

#[cfg(test)]
mod sim;

pub use arbiter::{CommandArbiter, Cycle};
pub use behavior::Behavior;
pub use config::{BehaviorConfig, MotionConfig, TurnConfig};
pub use error::{MotionError, ParameterError};
pub use rover::{Interrupt, ManeuverOutcome, Rover, Uninterrupted};
