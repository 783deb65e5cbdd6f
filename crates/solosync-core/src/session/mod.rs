//! Guided playback of one routine.

pub mod effects;
pub mod machine;
pub mod runner;
pub mod view;

pub use effects::{PlatformEffects, SessionEffects, SessionToggles};
pub use machine::SessionMachine;
pub use runner::{Control, Outcome, SessionRunner};
pub use view::SessionView;
