use crate::config::WatchdogConfig;
use crate::host::Host;
use tracing::{debug, enabled, trace, warn, Level};

/// Ticks per second of a server that keeps up
pub const NOMINAL_TPS: f64 = 20.0;

/// Milliseconds one tick may take at nominal speed
pub const TICK_BUDGET_MS: f64 = 1000.0 / NOMINAL_TPS;

/// TPS derived from the average tick time, never above [`NOMINAL_TPS`]
pub fn ticks_per_second(average_tick_time_ms: f64) -> f64 {
    if average_tick_time_ms <= 0.0 {
        NOMINAL_TPS
    } else {
        (1000.0 / average_tick_time_ms).min(NOMINAL_TPS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EscalationCause {
    /// The tick counter has not moved for this long
    Hung { seconds: u64 },
    /// TPS has been under the threshold for this long
    LowTps { seconds: u64, threshold: u32 },
}

/// Result of one watchdog check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WatchdogVerdict {
    Healthy { tps: f64 },
    Lagging { seconds: u64, tps: f64 },
    Hanging { seconds: u64 },
    Recovered,
    Escalate(EscalationCause),
}

/// Hang and lag detector. Owned by the watchdog timer; nothing else reads or
/// writes its counters.
#[derive(Debug)]
pub struct WatchdogMonitor {
    config: WatchdogConfig,
    last_tick: u64,
    hung_ticks: u32,
    lag_ticks: u32,
    is_hanging: bool,
}

impl WatchdogMonitor {
    pub fn new(config: &WatchdogConfig) -> Self {
        Self {
            config: config.clone(),
            last_tick: 0,
            hung_ticks: 0,
            lag_ticks: 0,
            is_hanging: false,
        }
    }

    pub fn is_hanging(&self) -> bool {
        self.is_hanging
    }

    pub fn hung_ticks(&self) -> u32 {
        self.hung_ticks
    }

    pub fn lag_ticks(&self) -> u32 {
        self.lag_ticks
    }

    /// Run one check against the host's loop counters
    pub fn check(&mut self, host: &dyn Host) -> WatchdogVerdict {
        if self.is_hanging {
            self.do_hanging(host)
        } else {
            self.do_monitor(host)
        }
    }

    /// Checks if the server is stuck on a tick, then if TPS is too low for
    /// too long
    fn do_monitor(&mut self, host: &dyn Host) -> WatchdogVerdict {
        let average_tick_time = host.average_tick_time_ms();
        let tps = ticks_per_second(average_tick_time);

        if enabled!(Level::TRACE) {
            trace!(
                "Watchdog: avg. tick latency: {:.2} / {} ms",
                average_tick_time,
                TICK_BUDGET_MS
            );
            trace!("Watchdog: avg. TPS: {:.2} / {}", tps, NOMINAL_TPS);
        }

        let server_tick = host.tick_count();
        if server_tick == self.last_tick {
            debug!("No advance in server ticks; server is hanging");
            self.is_hanging = true;
            self.hung_ticks = 1;
            return WatchdogVerdict::Hanging {
                seconds: self.seconds(self.hung_ticks),
            };
        }
        self.last_tick = server_tick;

        if tps < f64::from(self.config.low_tps_threshold) {
            self.lag_ticks += 1;
            let lag_secs = self.seconds(self.lag_ticks);
            trace!("TPS too low since {} seconds", lag_secs);

            if lag_secs >= u64::from(self.config.low_tps_timeout_seconds) {
                warn!(
                    "TPS below {} since {} seconds",
                    self.config.low_tps_threshold, lag_secs
                );
                return WatchdogVerdict::Escalate(EscalationCause::LowTps {
                    seconds: lag_secs,
                    threshold: self.config.low_tps_threshold,
                });
            }

            return WatchdogVerdict::Lagging {
                seconds: lag_secs,
                tps,
            };
        }

        self.lag_ticks = 0;
        WatchdogVerdict::Healthy { tps }
    }

    /// Follow-up check of a server that stopped ticking; escalates once it
    /// has been stuck for the configured timeout
    fn do_hanging(&mut self, host: &dyn Host) -> WatchdogVerdict {
        let server_tick = host.tick_count();
        if server_tick != self.last_tick {
            debug!("Server no longer hanging");
            self.is_hanging = false;
            self.hung_ticks = 0;
            return WatchdogVerdict::Recovered;
        }

        self.hung_ticks += 1;
        let hang_secs = self.seconds(self.hung_ticks);
        trace!("Server hanging for {} seconds", hang_secs);

        if hang_secs >= u64::from(self.config.timeout_seconds) {
            warn!("Server is hung on a tick after {} seconds", hang_secs);
            return WatchdogVerdict::Escalate(EscalationCause::Hung { seconds: hang_secs });
        }

        WatchdogVerdict::Hanging { seconds: hang_secs }
    }

    fn seconds(&self, checks: u32) -> u64 {
        u64::from(checks) * u64::from(self.config.interval_seconds)
    }
}
