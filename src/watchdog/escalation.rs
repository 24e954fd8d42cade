use crate::host::{Host, ProcessControl};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;
use tracing::{error, warn};

/// How long a soft kill gets before the process is terminated anyway
pub const HARD_KILL_GRACE: Duration = Duration::from_secs(10);

/// Exit code of a hard kill
pub const HARD_KILL_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationKind {
    SoftKill,
    HardKill,
}

/// Kills an unresponsive server, politely first if configured to
#[derive(Clone)]
pub struct Escalation {
    host: Weak<dyn Host>,
    process: Arc<dyn ProcessControl>,
    attempt_soft_kill: bool,
    grace: Duration,
}

impl Escalation {
    pub fn new(host: Weak<dyn Host>, process: Arc<dyn ProcessControl>, attempt_soft_kill: bool) -> Self {
        Self {
            host,
            process,
            attempt_soft_kill,
            grace: HARD_KILL_GRACE,
        }
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn escalate(&self) -> EscalationKind {
        if self.attempt_soft_kill {
            self.perform_soft_kill();
            EscalationKind::SoftKill
        } else {
            self.perform_hard_kill();
            EscalationKind::HardKill
        }
    }

    /// Starts a fallback hard kill, then asks the host to halt without
    /// waiting on the stuck server thread
    pub fn perform_soft_kill(&self) {
        warn!("Attempting a soft kill of the server...");

        let process = Arc::clone(&self.process);
        let grace = self.grace;
        let spawned = thread::Builder::new()
            .name("Shutdown watchdog".to_string())
            .spawn(move || {
                thread::sleep(grace);
                warn!("Server still running {:?} after soft kill", grace);
                hard_kill(process.as_ref());
            });

        if let Err(e) = spawned {
            error!("Failed to start hard kill fallback: {}", e);
            self.perform_hard_kill();
            return;
        }

        match self.host.upgrade() {
            Some(host) => host.halt(false),
            None => warn!("Host already gone; waiting for hard kill fallback"),
        }
    }

    pub fn perform_hard_kill(&self) {
        hard_kill(self.process.as_ref());
    }
}

fn hard_kill(process: &dyn ProcessControl) {
    warn!("Attempting a hard kill of the server - data may be lost!");
    process.hard_halt(HARD_KILL_EXIT_CODE);
}
