use super::types::{SCHEDULE, VOTING};
use super::{AutoShutdown, ComponentState, ShutdownReason};
use crate::command::{CommandError, ShutdownCommand};
use crate::host::CommandSource;
use crate::schedule::{SequencerStep, TickPhase};
use crate::vote::VoteOutcome;
use tracing::info;

impl AutoShutdown {
    /// Host loop hook, called at the start and end of every server tick
    pub fn on_server_tick(&mut self, phase: TickPhase) -> SequencerStep {
        if self.component_state(SCHEDULE) != Some(ComponentState::Running) {
            return SequencerStep::Idle;
        }

        let step = self.sequencer.on_server_tick(phase);
        if step == SequencerStep::ShutDown {
            self.record_shutdown(ShutdownReason::Schedule);
            self.set_component_state(SCHEDULE, ComponentState::Stopped);
        }
        step
    }

    /// Run a console or chat command line. Returns `None` when the line is
    /// not a shutdown command. Rejections are also sent back to `source`.
    pub fn execute_command(
        &mut self,
        source: &CommandSource,
        line: &str,
    ) -> Option<Result<VoteOutcome, CommandError>> {
        let command = ShutdownCommand::parse_line(line)?;
        let enabled = self.component_state(VOTING) == Some(ComponentState::Running);

        let result = if enabled {
            command.and_then(|command| command.execute(&mut self.votes, self.host.as_ref(), source))
        } else {
            Err(CommandError::Disabled)
        };

        match &result {
            Ok(VoteOutcome::Passed) => self.record_shutdown(ShutdownReason::Vote),
            Ok(_) => {}
            Err(e) => source.send(&e.message()),
        }
        Some(result)
    }

    pub(super) fn record_shutdown(&mut self, reason: ShutdownReason) {
        if self.shutdown_reason.is_none() {
            info!("Shutdown reason: {:?}", reason);
            self.shutdown_reason = Some(reason);
        }
    }
}
