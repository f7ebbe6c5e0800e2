//! Text command source: one command per line, from stdin or a script file.
//!
//! ```text
//! button                 press the mode button
//! mode follow            select a mode (idle, avoid, follow, line)
//! key up                 remote key (up, down, left, right, close, open)
//! speed 5                remote speed level 1..9
//! app F 60               app name/value message (F, B, L, R, S, S1, S2)
//! pad !B516              app control-pad message
//! move ne 60             app 8-way move (e, ne, n, nw, w, sw, s, se)
//! connect / disconnect   app session
//! wait 500               pause the script, in milliseconds
//! quit
//! ```

use std::{
    fmt,
    io::BufRead,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use high_level_cmds::{
    command::{
        CommandEvent, DirectCommand, DirectCommandError, DirectionKey, PadButton, SpeedLevel,
    },
    Mode, MoveDirection,
};
use log::{debug, warn};
use rover_control::CommandArbiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLine {
    Event(CommandEvent),
    Wait(Duration),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnknownCommand(String),
    MissingArgument(&'static str),
    BadNumber(String),
    UnknownMode(String),
    UnknownKey(String),
    UnknownDirection(String),
    SpeedLevel(u8),
    Direct(DirectCommandError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownCommand(c) => write!(f, "unknown command `{}`", c),
            ParseError::MissingArgument(what) => write!(f, "missing {}", what),
            ParseError::BadNumber(n) => write!(f, "`{}` is not a number", n),
            ParseError::UnknownMode(m) => write!(f, "unknown mode `{}`", m),
            ParseError::UnknownKey(k) => write!(f, "unknown key `{}`", k),
            ParseError::UnknownDirection(d) => write!(f, "unknown direction `{}`", d),
            ParseError::SpeedLevel(l) => write!(f, "speed level {} is not in 1..=9", l),
            ParseError::Direct(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ParseError {}

pub fn parse_mode(name: &str) -> Result<Mode, ParseError> {
    Ok(match name {
        "idle" => Mode::Idle,
        "avoid" => Mode::AvoidObstacle,
        "follow" => Mode::Follow,
        "line" => Mode::LineFinder,
        _ => return Err(ParseError::UnknownMode(name.to_owned())),
    })
}

fn parse_key(name: &str) -> Result<DirectionKey, ParseError> {
    Ok(match name {
        "up" => DirectionKey::Up,
        "down" => DirectionKey::Down,
        "left" => DirectionKey::Left,
        "right" => DirectionKey::Right,
        "close" => DirectionKey::GripperClose,
        "open" => DirectionKey::GripperOpen,
        _ => return Err(ParseError::UnknownKey(name.to_owned())),
    })
}

fn parse_direction(name: &str) -> Result<MoveDirection, ParseError> {
    Ok(match name {
        "e" => MoveDirection::East,
        "ne" => MoveDirection::NorthEast,
        "n" => MoveDirection::North,
        "nw" => MoveDirection::NorthWest,
        "w" => MoveDirection::West,
        "sw" => MoveDirection::SouthWest,
        "s" => MoveDirection::South,
        "se" => MoveDirection::SouthEast,
        _ => return Err(ParseError::UnknownDirection(name.to_owned())),
    })
}

fn word<'a>(next: Option<&'a str>, what: &'static str) -> Result<&'a str, ParseError> {
    next.ok_or(ParseError::MissingArgument(what))
}

fn number<T: std::str::FromStr>(text: Option<&str>, what: &'static str) -> Result<T, ParseError> {
    let text = word(text, what)?;
    text.parse().map_err(|_| ParseError::BadNumber(text.to_owned()))
}

/// `Ok(None)` for blank lines and `#` comments.
pub fn parse_line(line: &str) -> Result<Option<ScriptLine>, ParseError> {
    let line = line.split('#').next().unwrap_or_default();
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let event = match command {
        "button" => CommandEvent::ButtonPressed,
        "mode" => CommandEvent::ModeSelect(parse_mode(word(words.next(), "mode")?)?),
        "key" => CommandEvent::DirectionKey(parse_key(word(words.next(), "key")?)?),
        "speed" => {
            let level: u8 = number(words.next(), "speed level")?;
            CommandEvent::SpeedLevel(SpeedLevel::new(level).ok_or(ParseError::SpeedLevel(level))?)
        }
        "app" => {
            let name = word(words.next(), "app message name")?;
            // Stop carries no value
            let value = match words.next() {
                Some(text) => number(Some(text), "app message value")?,
                None => 0,
            };
            let command = DirectCommand::from_name_value(name, value).map_err(ParseError::Direct)?;
            CommandEvent::Direct(command)
        }
        "pad" => {
            let button = PadButton::from_message(word(words.next(), "pad message")?);
            CommandEvent::Direct(DirectCommand::Pad(button))
        }
        "move" => {
            let direction = parse_direction(word(words.next(), "direction")?)?;
            let speed = number(words.next(), "move speed")?;
            CommandEvent::Direct(DirectCommand::Move(direction, speed))
        }
        "connect" => CommandEvent::RemoteSession(true),
        "disconnect" => CommandEvent::RemoteSession(false),
        "wait" => {
            let ms: u64 = number(words.next(), "wait time")?;
            return Ok(Some(ScriptLine::Wait(Duration::from_millis(ms))));
        }
        "quit" => return Ok(Some(ScriptLine::Quit)),
        other => return Err(ParseError::UnknownCommand(other.to_owned())),
    };
    Ok(Some(ScriptLine::Event(event)))
}

/// Feed commands from `input` to the arbiter on a thread of their own, like the
/// button and radio interrupt handlers on the robot. Only `quit` raises `quit`;
/// the end of the input does not.
pub fn spawn_producer<R>(
    input: R,
    arbiter: &'static CommandArbiter<CriticalSectionRawMutex>,
    quit: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("commands".into())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Command input failed: {}", e);
                        break;
                    }
                };
                match parse_line(&line) {
                    Ok(Some(ScriptLine::Event(event))) => {
                        debug!("Command {:?}", event);
                        arbiter.submit(event);
                    }
                    Ok(Some(ScriptLine::Wait(duration))) => thread::sleep(duration),
                    Ok(Some(ScriptLine::Quit)) => {
                        quit.store(true, Ordering::Relaxed);
                        return;
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Ignoring `{}`: {}", line.trim(), e),
                }
            }
            debug!("End of command input");
        })
}
