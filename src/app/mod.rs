mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::AutoShutdown;
pub use types::{ComponentState, ShutdownReason, SCHEDULE, VOTING, WATCHDOG};
