use super::types::{SCHEDULE, VOTING, WATCHDOG};
use super::{AutoShutdown, ComponentState};
use crate::error::{AutoShutdownError, Result};
use tracing::{error, info, warn};

impl AutoShutdown {
    /// Arm every enabled component. Fails if called more than once.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(AutoShutdownError::AlreadyArmed {
                component: "AutoShutdown",
            });
        }
        self.started = true;

        info!("Starting auto shutdown");

        if self.config.is_nothing_enabled() {
            warn!("It appears no auto shutdown features are enabled.");
            warn!("Please check the schedule, voting and watchdog sections of the configuration.");
            for component in [SCHEDULE, VOTING, WATCHDOG] {
                self.set_component_state(component, ComponentState::Disabled);
            }
            return Ok(());
        }

        if self.config.schedule.enabled {
            self.sequencer.arm(&self.timers).map_err(|e| {
                error!("Failed to arm the shutdown clock: {}", e);
                e
            })?;
            self.set_component_state(SCHEDULE, ComponentState::Running);
        } else {
            self.set_component_state(SCHEDULE, ComponentState::Disabled);
        }

        if self.config.voting.enabled {
            self.set_component_state(VOTING, ComponentState::Running);
            info!("Shutdown voting enabled");
        } else {
            self.set_component_state(VOTING, ComponentState::Disabled);
        }

        if self.config.watchdog.enabled {
            self.watchdog.arm(&self.timers).map_err(|e| {
                error!("Failed to arm the watchdog: {}", e);
                e
            })?;
            self.set_component_state(WATCHDOG, ComponentState::Running);
        } else {
            self.set_component_state(WATCHDOG, ComponentState::Disabled);
        }

        info!("Auto shutdown started successfully");
        Ok(())
    }
}
