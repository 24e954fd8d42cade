use super::{AutoShutdown, ComponentState, ShutdownReason};
use std::collections::HashMap;
use tracing::debug;

impl AutoShutdown {
    /// Update component state
    pub fn set_component_state(&mut self, component: &'static str, state: ComponentState) {
        self.component_states.insert(component, state);
        debug!("Component '{}' state changed to: {:?}", component, state);
    }

    /// Get component state
    pub fn component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.get(component).copied()
    }

    /// Get all component states
    pub fn component_states(&self) -> HashMap<&'static str, ComponentState> {
        self.component_states.clone()
    }

    /// What initiated the shutdown. The watchdog kills from its own thread,
    /// so its reason is read from the watchdog rather than recorded here.
    pub fn shutdown_reason(&self) -> Option<ShutdownReason> {
        self.shutdown_reason.or_else(|| {
            self.watchdog
                .has_escalated()
                .then_some(ShutdownReason::Watchdog)
        })
    }
}
