//! # SoloSync Core Library
//!
//! Guided playback of solo practice routines: a preparation countdown, then
//! each drill with its optional rest, with spoken and audible cues and the
//! screen kept awake while playing. Routines come from the SoloSync API; a
//! finished session is followed by a survey that is logged back to it.
//!
//! ## Architecture
//!
//! - **Phase timer**: a restartable countdown that the caller feeds elapsed
//!   time; every run carries an identity so stale events can be dropped
//! - **Session machine**: the `Idle -> Prep -> Activity/Rest -> Finished`
//!   state machine, triggering cues through the [`SessionEffects`] seam
//! - **Cues**: cancel-and-replace [`Announcer`], lazily opened
//!   [`BeepGenerator`], idempotent [`WakeLockManager`]
//! - **Runner**: async driver ticking the machine and applying user controls
//! - **API**: routines, session logs, auth with single-flight token refresh
//! - **Storage**: TOML configuration including the persisted player toggles
//!
//! ## Key Components
//!
//! - [`SessionMachine`]: playback state machine
//! - [`PhaseTimer`]: countdown with run identities
//! - [`ApiClient`]: HTTP access to the SoloSync API
//! - [`Config`]: application configuration management

pub mod api;
pub mod audio;
pub mod error;
pub mod events;
pub mod history;
pub mod logging;
pub mod routine;
pub mod session;
pub mod storage;
pub mod survey;
pub mod timer;
pub mod wake_lock;

pub use api::{ApiClient, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use audio::{Announcer, BeepGenerator, CueSwitch, Tone};
pub use error::{
    ApiError, ConfigError, CoreError, LoadError, ResourceError, SessionError, ValidationError,
};
pub use events::SessionEvent;
pub use history::{HistoryStats, MonthGrid};
pub use routine::{Routine, RoutineSummary, Step};
pub use session::{
    Control, Outcome, PlatformEffects, SessionEffects, SessionMachine, SessionRunner,
    SessionToggles, SessionView,
};
pub use storage::{Config, CueConfig, Preferences};
pub use survey::SurveyDraft;
pub use timer::{Phase, PhaseTimer, RunId};
pub use wake_lock::WakeLockManager;
