use serde::Serialize;

use super::effects::SessionEffects;
use super::machine::SessionMachine;
use crate::routine::{format_clock, Routine};
use crate::timer::Phase;

/// What the player screen shows at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub routine_name: String,
    pub phase: Phase,
    pub phase_label: &'static str,
    /// `Step 2 / 5`, empty before the first drill and once finished.
    pub position: String,
    pub title: String,
    pub notes: String,
    pub target: String,
    pub remaining_secs: u64,
    pub remaining: String,
    pub duration_secs: u64,
    pub next_up: String,
    pub is_active: bool,
    pub is_paused: bool,
    pub announcements_enabled: bool,
    pub audio_cues_enabled: bool,
}

impl SessionView {
    pub fn of<E: SessionEffects>(machine: &SessionMachine<E>) -> Self {
        let routine = machine.routine();
        let phase = machine.phase();
        let prefs = machine.preferences();
        let step = machine.current_step();

        let position = match phase.step_index() {
            Some(i) => format!("Step {} / {}", i + 1, routine.step_count()),
            None => String::new(),
        };
        let title = match (phase, step) {
            (Phase::Rest(_), _) => "Rest".to_string(),
            (_, Some(step)) => step.drill_name.clone(),
            (Phase::Prep, _) => "Get Ready".to_string(),
            (Phase::Finished, _) => "Session Finished!".to_string(),
            _ => routine.name.clone(),
        };
        let (notes, target) = match (phase, step) {
            (Phase::Activity(_), Some(step)) => {
                (step.notes_display().to_string(), step.target_display())
            }
            _ => (String::new(), String::new()),
        };

        Self {
            routine_name: routine.name.clone(),
            phase,
            phase_label: phase.label(),
            position,
            title,
            notes,
            target,
            remaining_secs: machine.remaining_secs(),
            remaining: format_clock(machine.remaining_secs()),
            duration_secs: machine.phase_duration_secs(),
            next_up: next_up(routine, phase),
            is_active: machine.is_active(),
            is_paused: machine.is_paused(),
            announcements_enabled: prefs.announcements_enabled,
            audio_cues_enabled: prefs.audio_cues_enabled,
        }
    }
}

/// The "coming next" line under the countdown.
pub fn next_up(routine: &Routine, phase: Phase) -> String {
    match phase {
        Phase::Idle | Phase::Prep => match routine.step(0) {
            Some(first) => format!("First Drill: {}", first.drill_name),
            None => String::new(),
        },
        Phase::Rest(i) => match routine.step(i + 1) {
            Some(next) => format!("Next Drill: {}", next.drill_name),
            None => "Last Rest!".to_string(),
        },
        Phase::Activity(i) => {
            if let Some(rest) = routine.step(i).and_then(|s| s.rest_secs()) {
                return format!("Next: Rest ({rest}s)");
            }
            match routine.step(i + 1) {
                Some(next) => format!("Next Drill: {}", next.drill_name),
                None => "Final Drill!".to_string(),
            }
        }
        Phase::Finished => String::new(),
    }
}
