pub mod app;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod host;
pub mod message;
pub mod schedule;
pub mod timer;
pub mod vote;
pub mod watchdog;

pub use app::{AutoShutdown, ComponentState, ShutdownReason};
pub use command::{CommandError, ShutdownCommand};
pub use config::AutoShutdownConfig;
pub use error::{AutoShutdownError, Result};
pub use host::{CommandSource, Host, Player, PlayerId, PlayerKind, ProcessControl, SystemProcess};
pub use message::Message;
pub use schedule::{SequencerStep, ShutdownSequencer, TickPhase};
pub use timer::TimerService;
pub use vote::{VoteCoordinator, VoteError, VoteOutcome, VoteStatus};
pub use watchdog::{Watchdog, WatchdogMonitor, WatchdogVerdict};
