use super::types::{SCHEDULE, VOTING, WATCHDOG};
use super::{AutoShutdown, ComponentState};
use tracing::info;

impl AutoShutdown {
    /// Stop the background timers at process teardown. Armed components are
    /// never re-armed afterwards.
    pub fn stop(&mut self) {
        info!("Stopping auto shutdown timers");
        self.timers.shutdown();

        for component in [SCHEDULE, VOTING, WATCHDOG] {
            if self.component_state(component) == Some(ComponentState::Running) {
                self.set_component_state(component, ComponentState::Stopped);
            }
        }
    }
}
