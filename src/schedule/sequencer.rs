use super::clock::first_fire;
use crate::config::{AutoShutdownConfig, MessagesConfig, ScheduleConfig};
use crate::error::{AutoShutdownError, Result};
use crate::executor;
use crate::host::Host;
use crate::message::Message;
use crate::timer::TimerService;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info};

/// Warnings broadcast before a scheduled shutdown, one per minute
pub const INITIAL_WARNINGS: u8 = 5;

/// The shutdown clock fires once a minute after the first shutdown time
pub const TICK_PERIOD: Duration = Duration::from_secs(60);

/// Single-slot mailbox between the shutdown timer and the host loop.
///
/// Firing overwrites, it never queues: several firings before the host loop
/// gets to [`TickSignal::take`] count as one.
#[derive(Debug, Default)]
pub struct TickSignal {
    pending: AtomicBool,
    registered: AtomicBool,
}

impl TickSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called from the timer thread
    pub fn fire(&self) {
        if !self.registered.swap(true, Ordering::AcqRel) {
            info!("Shutdown clock reached; registered with the host loop");
        }

        self.pending.store(true, Ordering::Release);
        debug!("Timer called; next shutdown tick will run");
    }

    /// Check-and-clear, called from the host loop
    pub fn take(&self) -> bool {
        self.registered.load(Ordering::Acquire) && self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Start,
    End,
}

/// What a host loop iteration did with the shutdown clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerStep {
    /// Nothing pending
    Idle,
    /// Players are online; shutdown postponed
    Delayed { remaining_minutes: u32 },
    /// A warning was broadcast with this many minutes left
    Warned { minutes_left: u8 },
    /// The shutdown executor ran
    ShutDown,
}

/// Warning, delay and kill countdown for the scheduled shutdown.
///
/// The timer only touches the [`TickSignal`]; every counter here is mutated
/// from [`ShutdownSequencer::on_server_tick`] on the host loop.
pub struct ShutdownSequencer {
    schedule: ScheduleConfig,
    messages: MessagesConfig,
    host: Weak<dyn Host>,
    signal: Arc<TickSignal>,
    warnings_left: u8,
    delay_minutes: u32,
    armed: bool,
    completed: bool,
}

impl ShutdownSequencer {
    pub fn new(config: &AutoShutdownConfig, host: Weak<dyn Host>) -> Self {
        Self {
            schedule: config.schedule.clone(),
            messages: config.messages.clone(),
            host,
            signal: Arc::new(TickSignal::new()),
            warnings_left: INITIAL_WARNINGS,
            delay_minutes: 0,
            armed: false,
            completed: false,
        }
    }

    /// Start the shutdown clock. Returns the first firing time.
    pub fn arm(&mut self, timers: &TimerService) -> Result<DateTime<Utc>> {
        if self.armed {
            return Err(AutoShutdownError::AlreadyArmed {
                component: "ShutdownSequencer",
            });
        }
        self.armed = true;

        let (first, when) = first_fire(Utc::now(), &self.schedule);
        let signal = Arc::clone(&self.signal);
        timers.schedule_at("shutdown", first, TICK_PERIOD, move || signal.fire());

        info!("Next automatic shutdown: {}", when);
        Ok(first)
    }

    pub fn signal(&self) -> Arc<TickSignal> {
        Arc::clone(&self.signal)
    }

    pub fn warnings_left(&self) -> u8 {
        self.warnings_left
    }

    pub fn delay_minutes(&self) -> u32 {
        self.delay_minutes
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Runs on the host's main thread, once per loop iteration
    pub fn on_server_tick(&mut self, phase: TickPhase) -> SequencerStep {
        if phase == TickPhase::End || self.completed || !self.signal.take() {
            return SequencerStep::Idle;
        }

        let host = self.host.upgrade();

        if self.schedule.delay && self.perform_delay(host.as_deref()) {
            debug!(
                "Shutdown clock ticked; {} minute(s) of delay to go",
                self.delay_minutes
            );
            self.delay_minutes = self.delay_minutes.saturating_sub(1);
            return SequencerStep::Delayed {
                remaining_minutes: self.delay_minutes,
            };
        }

        if self.schedule.warnings && self.warnings_left > 0 {
            let minutes_left = self.warnings_left;
            self.perform_warning(host.as_deref());
            debug!(
                "Shutdown clock ticked; {} warning(s) to go",
                self.warnings_left
            );
            return SequencerStep::Warned { minutes_left };
        }

        self.completed = true;
        executor::shutdown(host.as_deref(), &Message::literal(self.messages.kick.clone()));
        SequencerStep::ShutDown
    }

    /// True while the shutdown should stay postponed. Finding real players
    /// online starts a new delay and re-arms the full set of warnings.
    fn perform_delay(&mut self, host: Option<&dyn Host>) -> bool {
        if self.delay_minutes > 0 {
            return true;
        }

        if !executor::has_real_players(host) {
            return false;
        }

        self.warnings_left = INITIAL_WARNINGS;
        self.delay_minutes += self.schedule.delay_by;
        info!(
            "Shutdown delayed by {} minutes; server is not empty",
            self.delay_minutes
        );
        true
    }

    fn perform_warning(&mut self, host: Option<&dyn Host>) {
        let warning = self
            .messages
            .warn
            .replace("%m", &self.warnings_left.to_string());

        if let Some(host) = host {
            host.broadcast(&Message::literal(format!("*** {}", warning)));
        }
        info!("{}", warning);
        self.warnings_left -= 1;
    }
}
