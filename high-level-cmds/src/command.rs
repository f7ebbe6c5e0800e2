//! Commands delivered by the button, the remote control and the companion app.

use crate::{Mode, MoveDirection};

/// A key on the remote that is executed by the Idle mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DirectionKey {
    Up,
    Down,
    Left,
    Right,
    GripperClose,
    GripperOpen,
}

/// Cruise speed preset picked with the number keys of the remote.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpeedLevel(u8);

const SPEED_LEVEL_PERCENT: [u8; 9] = [20, 25, 30, 40, 50, 60, 70, 80, 100];

impl SpeedLevel {
    /// Levels go from 1 to 9.
    pub fn new(level: u8) -> Option<Self> {
        (1..=9).contains(&level).then_some(Self(level))
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    pub fn percent(&self) -> u8 {
        SPEED_LEVEL_PERCENT[(self.0 - 1) as usize]
    }
}

/// Servo output of the rover.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ServoChannel {
    S1,
    S2,
}

/// A button of the app's control pad.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PadButton {
    Up,
    Down,
    Left,
    Right,
    /// Servo preset buttons.
    A,
    B,
    C,
    D,
    /// Any other pad message, including button releases.
    Released,
}

impl PadButton {
    /// Decodes a pad string message such as `!B516` (button 5 pressed).
    pub fn from_message(message: &str) -> Self {
        match message {
            "!B516" => PadButton::Up,
            "!B615" => PadButton::Down,
            "!B714" => PadButton::Left,
            "!B814" => PadButton::Right,
            "!B11:" => PadButton::A,
            "!B219" => PadButton::B,
            "!B318" => PadButton::C,
            "!B417" => PadButton::D,
            _ => PadButton::Released,
        }
    }
}

/// A command from the app that acts on the motors right away, whatever the mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DirectCommand {
    Forward(i32),
    Backward(i32),
    /// The rover turns at two thirds of the given value.
    TurnLeft(i32),
    TurnRight(i32),
    /// Stop and fall back to the default app cruise speed.
    Stop,
    Servo(ServoChannel, i32),
    Pad(PadButton),
    Move(MoveDirection, i32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DirectCommandError {
    UnknownAxis,
}

impl core::fmt::Display for DirectCommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DirectCommandError::UnknownAxis => write!(f, "unknown direct command axis"),
        }
    }
}

impl DirectCommand {
    /// Decodes an app `name = value` message.
    pub fn from_name_value(name: &str, value: i32) -> Result<Self, DirectCommandError> {
        Ok(match name {
            "F" => DirectCommand::Forward(value),
            "B" => DirectCommand::Backward(value),
            "L" => DirectCommand::TurnLeft(value),
            "R" => DirectCommand::TurnRight(value),
            "S" => DirectCommand::Stop,
            "S1" => DirectCommand::Servo(ServoChannel::S1, value),
            "S2" => DirectCommand::Servo(ServoChannel::S2, value),
            _ => return Err(DirectCommandError::UnknownAxis),
        })
    }
}

/// An event from any of the command sources.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandEvent {
    /// The physical button: cycle to the next mode.
    ButtonPressed,
    /// Jump straight to the given mode.
    ModeSelect(Mode),
    DirectionKey(DirectionKey),
    SpeedLevel(SpeedLevel),
    Direct(DirectCommand),
    /// The app connected or disconnected.
    RemoteSession(bool),
}

/// Latest manual command together with the cruise speed to run it at.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PendingCommand {
    pub key: Option<DirectionKey>,
    pub cruise_speed: u8,
}
