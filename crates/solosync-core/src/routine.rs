//! Routine and step model, as served by the assigned-routines endpoint.
//!
//! Steps are ordered by `order` once on load and are never mutated after
//! that; the session machine only ever reads them.

use serde::{Deserialize, Serialize};

/// One drill within a routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Position within the routine as stored server-side.
    #[serde(default)]
    pub order: u32,
    /// Drill identifier.
    #[serde(rename = "drill")]
    pub drill_id: u64,
    pub drill_name: String,
    /// Activity duration in seconds. Zero or absent means a rep-counted drill.
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub reps_target: Option<u32>,
    /// Rest after this drill in seconds. Zero or absent means no rest phase.
    #[serde(default)]
    pub rest_after_seconds: Option<u64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub youtube_link: Option<String>,
    /// Metric names the post-session survey asks for.
    #[serde(default)]
    pub metrics_to_collect: Vec<String>,
}

impl Step {
    /// Countdown length of the activity phase. A zero duration still runs
    /// a one-second tick so the phase completes.
    pub fn activity_secs(&self) -> u64 {
        self.duration_seconds.unwrap_or(0).max(1)
    }

    /// Rest following this step, or `None` when no rest phase follows.
    pub fn rest_secs(&self) -> Option<u64> {
        self.rest_after_seconds.filter(|&secs| secs > 0)
    }

    pub fn has_rest(&self) -> bool {
        self.rest_secs().is_some()
    }

    /// What the player shows as the drill's target.
    pub fn target_display(&self) -> String {
        match (self.duration_seconds, self.reps_target) {
            (Some(secs), _) if secs > 0 => format!("{secs}s"),
            (_, Some(reps)) => format!("{reps} reps"),
            _ => "N/A".to_string(),
        }
    }

    pub fn notes_display(&self) -> &str {
        match self.notes.as_deref() {
            Some(notes) if !notes.trim().is_empty() => notes,
            _ => "None",
        }
    }
}

/// An ordered set of drills assigned to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by_username: Option<String>,
    #[serde(default)]
    pub difficulty_display: Option<String>,
    #[serde(default)]
    pub difficulty_value: Option<u8>,
    #[serde(default)]
    pub total_duration_seconds: Option<u64>,
    #[serde(default)]
    pub total_duration_display: Option<String>,
    #[serde(rename = "routine_steps", default)]
    steps: Vec<Step>,
}

impl Routine {
    pub fn new(id: u64, name: impl Into<String>, steps: Vec<Step>) -> Self {
        let mut routine = Self {
            id,
            name: name.into(),
            description: None,
            created_by_username: None,
            difficulty_display: None,
            difficulty_value: None,
            total_duration_seconds: None,
            total_duration_display: None,
            steps,
        };
        routine.normalize();
        routine
    }

    /// Sort steps by their server-side order. Called once after decoding.
    pub fn normalize(&mut self) {
        self.steps.sort_by_key(|s| s.order);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Activity plus rest time across all steps, rest after the last step included.
    pub fn total_duration_secs(&self) -> u64 {
        self.steps
            .iter()
            .map(|s| s.duration_seconds.unwrap_or(0) + s.rest_after_seconds.unwrap_or(0))
            .sum()
    }

    /// Total duration as the server words it, falling back to `m:ss`.
    pub fn total_display(&self) -> String {
        match self.total_duration_display.as_deref() {
            Some(display) if !display.trim().is_empty() => display.to_string(),
            _ => format_clock(
                self.total_duration_seconds
                    .unwrap_or_else(|| self.total_duration_secs()),
            ),
        }
    }

    /// Steps whose drill asks for at least one post-session metric.
    pub fn steps_with_metrics(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| !s.metrics_to_collect.is_empty())
    }
}

/// Entry of the assigned-routines list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty_display: Option<String>,
    #[serde(default)]
    pub difficulty_value: Option<u8>,
    #[serde(default)]
    pub total_duration_display: Option<String>,
}

/// Formats seconds as `m:ss`.
pub fn format_clock(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn step(order: u32, name: &str, duration: u64, rest: Option<u64>) -> Step {
        Step {
            order,
            drill_id: 100 + order as u64,
            drill_name: name.to_string(),
            duration_seconds: Some(duration),
            reps_target: None,
            rest_after_seconds: rest,
            notes: None,
            youtube_link: None,
            metrics_to_collect: Vec::new(),
        }
    }

    /// Two steps, durations [10, 5], rest [0, 3].
    pub fn two_step() -> Routine {
        Routine::new(
            7,
            "Footwork Basics",
            vec![
                step(1, "Ghosting", 10, Some(0)),
                step(2, "Shadow Swings", 5, Some(3)),
            ],
        )
    }
}
