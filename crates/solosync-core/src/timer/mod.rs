mod phase;
mod phase_timer;

pub use phase::Phase;
pub use phase_timer::{PhaseTimer, RunId, TimerEvent, TimerSignal};
