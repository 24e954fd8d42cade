mod clock;
mod sequencer;


pub use clock::{first_fire, next_shutdown_at, DISPLAY_FORMAT};
pub use sequencer::{
    SequencerStep, ShutdownSequencer, TickPhase, TickSignal, INITIAL_WARNINGS, TICK_PERIOD,
};
