//! Contracts the embedding server has to provide.
//!
//! Everything in this crate talks to the server through [`Host`] and
//! [`Player`]. The watchdog reads [`Host::tick_count`] and
//! [`Host::average_tick_time_ms`] from its own thread, so implementations
//! should back them with atomics or similarly cheap reads.

pub mod sim;

use crate::message::Message;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Stable identity of a connected player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Whether a player is a person or a server-side automaton (fake player,
/// machine, bot)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerKind {
    Real,
    Automated,
}

pub trait Player: Send + Sync {
    fn id(&self) -> PlayerId;

    fn name(&self) -> String;

    fn kind(&self) -> PlayerKind;

    /// Deliver a chat/system message to this player only
    fn send(&self, message: &Message);

    /// Drop the player's connection, showing `message` as the reason
    fn disconnect(&self, message: &Message);

    fn is_real(&self) -> bool {
        self.kind() == PlayerKind::Real
    }
}

pub trait Host: Send + Sync {
    /// Main loop iteration counter; only ever increases
    fn tick_count(&self) -> u64;

    /// Rolling average duration of a main loop iteration, in milliseconds
    fn average_tick_time_ms(&self) -> f64;

    /// Currently connected players, including automated ones
    fn players(&self) -> Vec<Arc<dyn Player>>;

    fn broadcast(&self, message: &Message);

    /// Request an orderly host shutdown. Returns without waiting for the
    /// server thread unless `wait_for_server` is set.
    fn halt(&self, wait_for_server: bool);
}

/// Unconditional process termination
pub trait ProcessControl: Send + Sync {
    fn hard_halt(&self, code: i32);
}

/// Terminates the real process, skipping destructors, atexit handlers and any
/// host shutdown hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcess;

impl ProcessControl for SystemProcess {
    #[cfg(unix)]
    fn hard_halt(&self, code: i32) {
        // SAFETY: _exit only terminates the calling process.
        unsafe { libc::_exit(code) }
    }

    #[cfg(not(unix))]
    fn hard_halt(&self, _code: i32) {
        std::process::abort()
    }
}

/// Who issued a command
#[derive(Clone)]
pub enum CommandSource {
    Player(Arc<dyn Player>),
    Console,
}

impl CommandSource {
    pub fn player(&self) -> Option<&Arc<dyn Player>> {
        match self {
            CommandSource::Player(player) => Some(player),
            CommandSource::Console => None,
        }
    }

    pub fn name(&self) -> String {
        match self {
            CommandSource::Player(player) => player.name(),
            CommandSource::Console => "Server".to_string(),
        }
    }

    /// Reply to whoever issued the command
    pub fn send(&self, message: &Message) {
        match self {
            CommandSource::Player(player) => player.send(message),
            CommandSource::Console => info!("{}", message.text()),
        }
    }
}

impl fmt::Debug for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSource::Player(player) => f
                .debug_tuple("Player")
                .field(&player.name())
                .field(&player.id())
                .finish(),
            CommandSource::Console => f.write_str("Console"),
        }
    }
}
