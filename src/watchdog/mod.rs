//! Hang and lag watchdog.
//!
//! A background timer samples the host's tick counter and average tick time.
//! A server stuck on one tick, or running under the TPS threshold, for too
//! long gets killed.

mod escalation;
mod monitor;


pub use escalation::{Escalation, EscalationKind, HARD_KILL_EXIT_CODE, HARD_KILL_GRACE};
pub use monitor::{
    ticks_per_second, EscalationCause, WatchdogMonitor, WatchdogVerdict, NOMINAL_TPS,
    TICK_BUDGET_MS,
};

use crate::config::WatchdogConfig;
use crate::error::{AutoShutdownError, Result};
use crate::host::{Host, ProcessControl};
use crate::timer::TimerService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Watchdog {
    interval: Duration,
    host: Weak<dyn Host>,
    monitor: Option<WatchdogMonitor>,
    escalation: Escalation,
    escalated: Arc<AtomicBool>,
}

impl Watchdog {
    pub fn new(config: &WatchdogConfig, host: Weak<dyn Host>, process: Arc<dyn ProcessControl>) -> Self {
        let escalation = Escalation::new(host.clone(), process, config.attempt_soft_kill);
        Self {
            interval: Duration::from_secs(u64::from(config.interval_seconds)),
            host,
            monitor: Some(WatchdogMonitor::new(config)),
            escalation,
            escalated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.escalation = self.escalation.with_grace_period(grace);
        self
    }

    pub fn is_armed(&self) -> bool {
        self.monitor.is_none()
    }

    /// True once a kill has been attempted
    pub fn has_escalated(&self) -> bool {
        self.escalated.load(Ordering::Acquire)
    }

    /// Start checking every interval, first check one interval from now.
    /// The monitor moves into the timer task.
    pub fn arm(&mut self, timers: &TimerService) -> Result<()> {
        let mut monitor = self.monitor.take().ok_or(AutoShutdownError::AlreadyArmed {
            component: "Watchdog",
        })?;
        let host = self.host.clone();
        let escalation = self.escalation.clone();
        let escalated = Arc::clone(&self.escalated);

        timers.schedule_after("watchdog", self.interval, self.interval, move || {
            let Some(host) = host.upgrade() else {
                debug!("Watchdog check skipped; host is gone");
                return;
            };

            if let WatchdogVerdict::Escalate(cause) = monitor.check(host.as_ref()) {
                if !escalated.swap(true, Ordering::AcqRel) {
                    warn!("Watchdog shutting down the server: {:?}", cause);
                }
                escalation.escalate();
            }
        });

        info!("Watchdog started, checking every {:?}", self.interval);
        Ok(())
    }
}
