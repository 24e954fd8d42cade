/// Component lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Running,
    Disabled,
}

/// What initiated the shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Schedule,
    Vote,
    Watchdog,
}

pub const SCHEDULE: &str = "schedule";
pub const VOTING: &str = "voting";
pub const WATCHDOG: &str = "watchdog";
