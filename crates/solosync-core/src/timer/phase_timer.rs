//! Restartable countdown for one phase at a time.
//!
//! The timer has no thread of its own: the caller feeds it elapsed time via
//! `advance()` (or whole seconds via `tick()`). Every `restart()` opens a new
//! run with a fresh `RunId`, and every event carries the id of the run that
//! produced it so the consumer can drop events from a superseded run.
//!
//! ```ignore
//! let mut timer = PhaseTimer::new();
//! let run = timer.restart(10, true);
//! for event in timer.advance(elapsed) { /* match event.run against run */ }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

const ONE_SEC: Duration = Duration::from_secs(1);

/// Identity of one countdown run. Strictly increasing per timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(u64);

impl RunId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "lowercase")]
pub enum TimerSignal {
    /// One second elapsed; `remaining_secs` is always > 0.
    Tick { remaining_secs: u64 },
    /// Remaining time reached zero. Emitted once per run.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub run: RunId,
    pub signal: TimerSignal,
}

#[derive(Debug, Clone)]
struct Run {
    id: RunId,
    duration_secs: u64,
    remaining_secs: u64,
    running: bool,
    /// Sub-second time carried between `advance()` calls.
    carry: Duration,
    completed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PhaseTimer {
    last_id: u64,
    run: Option<Run>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Id of the run currently able to produce events.
    pub fn live_run(&self) -> Option<RunId> {
        self.run.as_ref().filter(|r| !r.completed).map(|r| r.id)
    }

    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|r| r.running && !r.completed)
    }

    pub fn remaining_secs(&self) -> u64 {
        self.run.as_ref().map(|r| r.remaining_secs).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> u64 {
        self.run.as_ref().map(|r| r.duration_secs).unwrap_or(0)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Abandon the current run (if any) and begin a new one.
    ///
    /// Durations below one second are raised to one so that every run
    /// completes through a tick.
    pub fn restart(&mut self, duration_secs: u64, running: bool) -> RunId {
        self.last_id += 1;
        let id = RunId(self.last_id);
        let duration_secs = duration_secs.max(1);
        self.run = Some(Run {
            id,
            duration_secs,
            remaining_secs: duration_secs,
            running,
            carry: Duration::ZERO,
            completed: false,
        });
        id
    }

    /// Freeze or unfreeze the current run in place.
    pub fn set_running(&mut self, running: bool) {
        if let Some(run) = self.run.as_mut() {
            if !run.completed {
                run.running = running;
            }
        }
    }

    /// Drop the current run. Subsequent `advance()` calls emit nothing.
    pub fn stop(&mut self) {
        self.run = None;
    }

    /// Feed elapsed wall time. Emits one `Tick` per whole second crossed and
    /// a single `Complete` when the countdown reaches zero.
    ///
    /// Time that elapses while paused is discarded.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        let Some(run) = self.run.as_mut() else {
            return events;
        };
        if !run.running || run.completed {
            return events;
        }

        run.carry += elapsed;
        while run.carry >= ONE_SEC && !run.completed {
            run.carry -= ONE_SEC;
            run.remaining_secs = run.remaining_secs.saturating_sub(1);
            let signal = if run.remaining_secs == 0 {
                run.completed = true;
                run.running = false;
                TimerSignal::Complete
            } else {
                TimerSignal::Tick {
                    remaining_secs: run.remaining_secs,
                }
            };
            events.push(TimerEvent { run: run.id, signal });
        }
        events
    }

    /// Advance by exactly one second.
    pub fn tick(&mut self) -> Vec<TimerEvent> {
        self.advance(ONE_SEC)
    }
}
