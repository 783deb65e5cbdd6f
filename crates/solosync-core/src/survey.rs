//! Post-session survey: difficulty, notes and per-drill metrics, turned into
//! a session log payload.

use std::collections::BTreeMap;

use crate::api::{MetricEntry, SessionLogPayload};
use crate::error::ValidationError;
use crate::routine::Routine;

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 5;
/// Longest value the server stores for one metric.
pub const MAX_METRIC_LEN: usize = 100;

/// One input the survey asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricPrompt {
    pub drill_id: u64,
    pub drill_name: String,
    pub metric_name: String,
}

impl MetricPrompt {
    /// `shots_made` -> `shots made`
    pub fn label(&self) -> String {
        self.metric_name.replace('_', " ")
    }
}

/// Metric inputs for every step that collects any, in step order.
pub fn metric_prompts(routine: &Routine) -> Vec<MetricPrompt> {
    routine
        .steps_with_metrics()
        .flat_map(|step| {
            step.metrics_to_collect.iter().map(|name| MetricPrompt {
                drill_id: step.drill_id,
                drill_name: step.drill_name.clone(),
                metric_name: name.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyDraft {
    pub difficulty: Option<u8>,
    pub notes: String,
    metrics: BTreeMap<(u64, String), String>,
}

impl SurveyDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_difficulty(&mut self, difficulty: u8) {
        self.difficulty = Some(difficulty);
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    pub fn set_metric(&mut self, drill_id: u64, metric_name: &str, value: impl Into<String>) {
        self.metrics
            .insert((drill_id, metric_name.to_string()), value.into());
    }

    pub fn metric(&self, drill_id: u64, metric_name: &str) -> Option<&str> {
        self.metrics
            .get(&(drill_id, metric_name.to_string()))
            .map(String::as_str)
    }

    /// Build the log payload for `routine`.
    ///
    /// Only metrics the routine's steps ask for are sent, and only those
    /// with a non-blank value.
    pub fn into_payload(self, routine: &Routine) -> Result<SessionLogPayload, ValidationError> {
        let difficulty = self.difficulty.ok_or_else(|| ValidationError::InvalidValue {
            field: "physical_difficulty".into(),
            message: "a rating from 1 to 5 is required".into(),
        })?;
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
            return Err(ValidationError::OutOfRange {
                field: "physical_difficulty".into(),
                value: difficulty as i64,
                min: MIN_DIFFICULTY as i64,
                max: MAX_DIFFICULTY as i64,
            });
        }

        let mut logged_metrics = Vec::new();
        for prompt in metric_prompts(routine) {
            let Some(value) = self.metric(prompt.drill_id, &prompt.metric_name) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if value.chars().count() > MAX_METRIC_LEN {
                return Err(ValidationError::InvalidValue {
                    field: format!("{}.{}", prompt.drill_name, prompt.metric_name),
                    message: format!("at most {MAX_METRIC_LEN} characters"),
                });
            }
            logged_metrics.push(MetricEntry {
                drill_id: prompt.drill_id,
                metric_name: prompt.metric_name,
                metric_value: value.to_string(),
            });
        }

        Ok(SessionLogPayload {
            routine_id: routine.id,
            physical_difficulty: difficulty,
            notes: self.notes,
            logged_metrics,
        })
    }
}
