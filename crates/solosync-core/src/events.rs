use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::{Phase, RunId};

/// Every state change of a playback session produces an Event.
/// The player renders them; the CLI can print them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    SessionStarted {
        session_id: Uuid,
        routine_id: u64,
        step_count: usize,
        at: DateTime<Utc>,
    },
    /// A new countdown began (prep, activity or rest).
    PhaseStarted {
        phase: Phase,
        duration_secs: u64,
        run: RunId,
        at: DateTime<Utc>,
    },
    /// One second of the current countdown elapsed.
    Tick {
        phase: Phase,
        remaining_secs: u64,
    },
    SessionPaused {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseSkipped {
        from: Phase,
        to: Phase,
        at: DateTime<Utc>,
    },
    /// All steps done; the survey flow takes over for `routine_id`.
    SessionFinished {
        session_id: Uuid,
        routine_id: u64,
        at: DateTime<Utc>,
    },
    /// Playback stopped before finishing (user navigated away).
    SessionAbandoned {
        session_id: Uuid,
        phase: Phase,
        at: DateTime<Utc>,
    },
    /// A player toggle changed.
    PreferencesChanged {
        announcements_enabled: bool,
        audio_cues_enabled: bool,
    },
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::SessionFinished { .. } | SessionEvent::SessionAbandoned { .. }
        )
    }
}
