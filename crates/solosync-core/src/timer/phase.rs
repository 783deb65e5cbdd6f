use serde::{Deserialize, Serialize};

/// Which countdown is current, and for which step.
///
/// ```text
/// Idle -> Prep -> Activity(0) -> [Rest(0)] -> Activity(1) -> ... -> Finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "step", rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Prep,
    Activity(usize),
    /// Rest following the activity of the given step.
    Rest(usize),
    Finished,
}

impl Phase {
    /// Step this phase belongs to, if any.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            Phase::Activity(i) | Phase::Rest(i) => Some(*i),
            _ => None,
        }
    }

    /// Position along the routine: -1 before the first drill, `step_count`
    /// once finished.
    pub fn ordinal(&self, step_count: usize) -> isize {
        match self {
            Phase::Idle | Phase::Prep => -1,
            Phase::Activity(i) | Phase::Rest(i) => *i as isize,
            Phase::Finished => step_count as isize,
        }
    }

    /// Phases that run a countdown.
    pub fn is_countdown(&self) -> bool {
        matches!(self, Phase::Prep | Phase::Activity(_) | Phase::Rest(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "Ready",
            Phase::Prep => "Get Ready",
            Phase::Activity(_) => "Activity",
            Phase::Rest(_) => "Rest",
            Phase::Finished => "Finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_brackets_steps() {
        assert_eq!(Phase::Prep.ordinal(3), -1);
        assert_eq!(Phase::Rest(1).ordinal(3), 1);
        assert_eq!(Phase::Finished.ordinal(3), 3);
    }

    #[test]
    fn serializes_with_step() {
        let json = serde_json::to_string(&Phase::Rest(2)).unwrap();
        assert_eq!(json, r#"{"kind":"rest","step":2}"#);
        let json = serde_json::to_string(&Phase::Prep).unwrap();
        assert_eq!(json, r#"{"kind":"prep"}"#);
    }
}
