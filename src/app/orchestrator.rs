use super::types::{ComponentState, ShutdownReason};
use crate::config::AutoShutdownConfig;
use crate::host::{Host, ProcessControl};
use crate::schedule::ShutdownSequencer;
use crate::timer::TimerService;
use crate::vote::VoteCoordinator;
use crate::watchdog::Watchdog;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide context owning the shutdown clock, the vote and the
/// watchdog. Created once, started once, then driven by the host loop through
/// [`AutoShutdown::on_server_tick`] and [`AutoShutdown::execute_command`].
pub struct AutoShutdown {
    pub(super) config: AutoShutdownConfig,
    pub(super) host: Arc<dyn Host>,
    pub(super) timers: TimerService,

    // Components
    pub(super) sequencer: ShutdownSequencer,
    pub(super) votes: VoteCoordinator,
    pub(super) watchdog: Watchdog,

    // Lifecycle management
    pub(super) started: bool,
    pub(super) component_states: HashMap<&'static str, ComponentState>,
    pub(super) shutdown_reason: Option<ShutdownReason>,
}

impl AutoShutdown {
    /// Create the context. The configuration is normalized here; nothing is
    /// armed until [`AutoShutdown::start`].
    pub fn new(
        mut config: AutoShutdownConfig,
        host: Arc<dyn Host>,
        process: Arc<dyn ProcessControl>,
        timers: TimerService,
    ) -> Self {
        config.normalize();

        let sequencer = ShutdownSequencer::new(&config, Arc::downgrade(&host));
        let votes = VoteCoordinator::new(&config.voting);
        let watchdog = Watchdog::new(&config.watchdog, Arc::downgrade(&host), process);

        Self {
            config,
            host,
            timers,
            sequencer,
            votes,
            watchdog,
            started: false,
            component_states: HashMap::new(),
            shutdown_reason: None,
        }
    }

    pub fn config(&self) -> &AutoShutdownConfig {
        &self.config
    }

    pub fn sequencer(&self) -> &ShutdownSequencer {
        &self.sequencer
    }

    pub fn votes(&self) -> &VoteCoordinator {
        &self.votes
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}
