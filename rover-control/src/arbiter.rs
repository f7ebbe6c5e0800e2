//! Shared command state between the event producers and the control loop.
//!
//! The button, the remote and the app all write here from their own handlers.
//! The behavior loop reads it once at the start of every cycle.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};
use high_level_cmds::{
    command::{CommandEvent, DirectCommand, DirectionKey, PendingCommand},
    Mode,
};
use log::info;

use crate::rover::Interrupt;

struct CommandState {
    mode: Mode,
    mode_changed: bool,
    key: Option<DirectionKey>,
    cruise_speed: u8,
    direct: Option<DirectCommand>,
    remote_connected: bool,
}

/// Snapshot taken by the control loop at the start of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    pub mode: Mode,
    /// The mode was (re)selected since the previous cycle.
    pub entered: bool,
    pub direct: Option<DirectCommand>,
    pub remote_connected: bool,
}

pub struct CommandArbiter<M: RawMutex> {
    state: Mutex<M, RefCell<CommandState>>,
}

impl<M: RawMutex> CommandArbiter<M> {
    /// Starts in Idle with the entry action pending, so the indicator is set on the first cycle.
    pub const fn new(cruise_speed: u8) -> Self {
        Self {
            state: Mutex::new(RefCell::new(CommandState {
                mode: Mode::Idle,
                mode_changed: true,
                key: None,
                cruise_speed,
                direct: None,
                remote_connected: false,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut CommandState) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Record one event. Each event overwrites at most one piece of state.
    pub fn submit(&self, event: CommandEvent) {
        match event {
            CommandEvent::ButtonPressed => self.press_button(),
            CommandEvent::ModeSelect(mode) => self.set_mode(mode),
            CommandEvent::DirectionKey(key) => self.with(|s| s.key = Some(key)),
            CommandEvent::SpeedLevel(level) => self.set_cruise_speed(level.percent()),
            CommandEvent::Direct(command) => self.with(|s| s.direct = Some(command)),
            CommandEvent::RemoteSession(connected) => {
                self.with(|s| s.remote_connected = connected);
                info!("Remote {}", if connected { "connected" } else { "disconnected" });
            }
        }
    }

    pub fn set_mode(&self, mode: Mode) {
        self.with(|s| {
            s.mode = mode;
            s.mode_changed = true;
        });
    }

    /// Cycle to the next mode.
    pub fn press_button(&self) {
        self.with(|s| {
            s.mode = s.mode.next();
            s.mode_changed = true;
        });
    }

    /// Replace the pending manual command and the cruise speed.
    pub fn push_command(&self, command: PendingCommand) {
        self.with(|s| {
            s.key = command.key;
            s.cruise_speed = command.cruise_speed;
        });
    }

    pub fn set_cruise_speed(&self, speed: u8) {
        self.with(|s| s.cruise_speed = speed);
    }

    pub fn mode(&self) -> Mode {
        self.with(|s| s.mode)
    }

    /// Consume the mode edge and the direct command.
    pub fn begin_cycle(&self) -> Cycle {
        self.with(|s| Cycle {
            mode: s.mode,
            entered: core::mem::take(&mut s.mode_changed),
            direct: s.direct.take(),
            remote_connected: s.remote_connected,
        })
    }

    /// Drain the pending key. The cruise speed stays.
    pub fn take_pending(&self) -> PendingCommand {
        self.with(|s| PendingCommand {
            key: s.key.take(),
            cruise_speed: s.cruise_speed,
        })
    }

    pub fn clear_key(&self) {
        self.with(|s| s.key = None);
    }

    /// Is there something a running maneuver should make room for?
    pub fn interrupt_pending(&self) -> bool {
        self.with(|s| s.mode_changed || s.direct.is_some())
    }

    /// Drop everything that has not been acted on yet.
    pub fn clear(&self) {
        self.with(|s| {
            s.key = None;
            s.direct = None;
            s.mode_changed = false;
        });
    }
}

impl<M: RawMutex> Interrupt for CommandArbiter<M> {
    fn is_raised(&self) -> bool {
        self.interrupt_pending()
    }
}
