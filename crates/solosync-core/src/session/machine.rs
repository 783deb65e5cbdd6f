//! Session state machine.
//!
//! Drives one routine through `Idle -> Prep -> Activity/Rest ... -> Finished`.
//! The machine owns the phase timer; whoever runs it feeds elapsed time via
//! [`SessionMachine::poll`] (or individual timer events via
//! [`SessionMachine::handle_timer`]) and user controls via the command
//! methods. Cues and the wake lock are triggered through [`SessionEffects`]
//! and never affect which transition happens.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::effects::{SessionEffects, SessionToggles};
use super::view::SessionView;
use crate::audio::Tone;
use crate::error::SessionError;
use crate::events::SessionEvent;
use crate::routine::{Routine, Step};
use crate::storage::{CueConfig, Preferences};
use crate::timer::{Phase, PhaseTimer, RunId, TimerEvent, TimerSignal};

pub struct SessionMachine<E: SessionEffects> {
    session_id: Uuid,
    routine: Routine,
    phase: Phase,
    paused: bool,
    timer: PhaseTimer,
    /// Run whose events are accepted. Anything else is stale.
    live_run: Option<RunId>,
    /// Whether the machine currently wants the wake lock held.
    wants_wake_lock: bool,
    cues: CueConfig,
    toggles: SessionToggles,
    effects: E,
}

impl<E: SessionEffects> SessionMachine<E> {
    pub fn new(routine: Routine, cues: CueConfig, toggles: SessionToggles, effects: E) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            routine,
            phase: Phase::Idle,
            paused: false,
            timer: PhaseTimer::new(),
            live_run: None,
            wants_wake_lock: false,
            cues,
            toggles,
            effects,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn routine(&self) -> &Routine {
        &self.routine
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Playing: in a countdown phase and not paused.
    pub fn is_active(&self) -> bool {
        self.phase.is_countdown() && !self.paused
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// -1 before the first drill, `step_count` once finished.
    pub fn current_step_index(&self) -> isize {
        self.phase.ordinal(self.routine.step_count())
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.phase.step_index().and_then(|i| self.routine.step(i))
    }

    /// The drill that follows the current phase's step.
    pub fn next_step(&self) -> Option<&Step> {
        match self.phase {
            Phase::Idle | Phase::Prep => self.routine.step(0),
            Phase::Activity(i) | Phase::Rest(i) => self.routine.step(i + 1),
            Phase::Finished => None,
        }
    }

    pub fn remaining_secs(&self) -> u64 {
        self.timer.remaining_secs()
    }

    pub fn phase_duration_secs(&self) -> u64 {
        self.timer.duration_secs()
    }

    pub fn live_run(&self) -> Option<RunId> {
        self.live_run
    }

    pub fn preferences(&self) -> Preferences {
        self.toggles.snapshot()
    }

    pub fn toggles(&self) -> &SessionToggles {
        &self.toggles
    }

    pub fn cues(&self) -> &CueConfig {
        &self.cues
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut E {
        &mut self.effects
    }

    pub fn view(&self) -> SessionView {
        SessionView::of(self)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin playback with the prep countdown.
    ///
    /// Fails without any side effect when the routine has no steps. Calling
    /// it on a session that already started does nothing.
    pub fn start(&mut self) -> Result<Vec<SessionEvent>, SessionError> {
        if self.phase != Phase::Idle {
            debug!(phase = ?self.phase, "start ignored, session already started");
            return Ok(Vec::new());
        }
        let Some(first) = self.routine.step(0) else {
            return Err(SessionError::Configuration(
                "Routine has no steps.".to_string(),
            ));
        };
        let text = format!("Starting with: {}", first.drill_name);

        info!(
            routine_id = self.routine.id,
            steps = self.routine.step_count(),
            "session started"
        );
        self.hold_wake_lock();
        self.announce(&text);

        let mut events = vec![SessionEvent::SessionStarted {
            session_id: self.session_id,
            routine_id: self.routine.id,
            step_count: self.routine.step_count(),
            at: Utc::now(),
        }];
        events.push(self.enter(Phase::Prep, self.cues.prep_secs));
        Ok(events)
    }

    /// Freeze the current countdown. No-op unless playing.
    pub fn pause(&mut self) -> Option<SessionEvent> {
        if !self.is_active() {
            return None;
        }
        self.paused = true;
        self.timer.set_running(false);
        self.effects.cancel_announcements();
        self.drop_wake_lock();
        debug!(phase = ?self.phase, remaining = self.remaining_secs(), "paused");
        Some(SessionEvent::SessionPaused {
            phase: self.phase,
            remaining_secs: self.remaining_secs(),
            at: Utc::now(),
        })
    }

    /// Continue a paused countdown where it stopped. No entry cues replay.
    pub fn resume(&mut self) -> Option<SessionEvent> {
        if !self.paused || !self.phase.is_countdown() {
            return None;
        }
        self.paused = false;
        self.timer.set_running(true);
        self.hold_wake_lock();
        debug!(phase = ?self.phase, remaining = self.remaining_secs(), "resumed");
        Some(SessionEvent::SessionResumed {
            phase: self.phase,
            remaining_secs: self.remaining_secs(),
            at: Utc::now(),
        })
    }

    pub fn toggle_pause(&mut self) -> Option<SessionEvent> {
        if self.paused {
            self.resume()
        } else {
            self.pause()
        }
    }

    /// End the current phase early, exactly as if its timer completed.
    /// Only accepted while playing.
    pub fn skip(&mut self) -> Vec<SessionEvent> {
        if !self.is_active() {
            debug!(phase = ?self.phase, paused = self.paused, "skip ignored");
            return Vec::new();
        }
        let from = self.phase;
        let mut events = self.complete_phase();
        events.insert(
            0,
            SessionEvent::PhaseSkipped {
                from,
                to: self.phase,
                at: Utc::now(),
            },
        );
        events
    }

    /// Stop playback before the end (navigation away). Cancels speech and
    /// releases the wake lock.
    pub fn abandon(&mut self) -> Option<SessionEvent> {
        if !self.phase.is_countdown() {
            return None;
        }
        let phase = self.phase;
        self.timer.stop();
        self.live_run = None;
        self.paused = false;
        self.phase = Phase::Idle;
        self.effects.cancel_announcements();
        self.drop_wake_lock();
        info!(routine_id = self.routine.id, ?phase, "session abandoned");
        Some(SessionEvent::SessionAbandoned {
            session_id: self.session_id,
            phase,
            at: Utc::now(),
        })
    }

    pub fn set_announcements(&mut self, enabled: bool) -> SessionEvent {
        self.toggles.announcements.set(enabled);
        if !enabled {
            self.effects.cancel_announcements();
        }
        self.preferences_changed()
    }

    pub fn set_audio_cues(&mut self, enabled: bool) -> SessionEvent {
        self.toggles.audio_cues.set(enabled);
        self.preferences_changed()
    }

    /// Feed elapsed time to the phase timer and apply what it emits.
    pub fn poll(&mut self, elapsed: Duration) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for event in self.timer.advance(elapsed) {
            events.extend(self.handle_timer(event));
        }
        events
    }

    /// Apply one timer event. Events from a run other than the live one
    /// are dropped.
    pub fn handle_timer(&mut self, event: TimerEvent) -> Vec<SessionEvent> {
        if self.live_run != Some(event.run) {
            debug!(
                run = event.run.get(),
                live = ?self.live_run.map(RunId::get),
                "stale timer event discarded"
            );
            return Vec::new();
        }
        match event.signal {
            TimerSignal::Tick { remaining_secs } => {
                self.countdown_cue(remaining_secs);
                vec![SessionEvent::Tick {
                    phase: self.phase,
                    remaining_secs,
                }]
            }
            TimerSignal::Complete => self.complete_phase(),
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn complete_phase(&mut self) -> Vec<SessionEvent> {
        match self.phase {
            Phase::Prep => {
                let Some(first) = self.routine.step(0) else {
                    return self.finish();
                };
                let text = format!("Starting drill: {}", first.drill_name);
                let secs = first.activity_secs();
                self.announce(&text);
                self.beep(self.go_tone());
                vec![self.enter(Phase::Activity(0), secs)]
            }
            Phase::Activity(i) => {
                match self.routine.step(i).and_then(Step::rest_secs) {
                    Some(rest) => {
                        let text = match self.routine.step(i + 1) {
                            Some(next) => format!("Rest. Next drill: {}", next.drill_name),
                            None => "Rest. Session finishes after this rest.".to_string(),
                        };
                        self.announce(&text);
                        vec![self.enter(Phase::Rest(i), rest)]
                    }
                    None => self.advance_to(i + 1),
                }
            }
            Phase::Rest(i) => self.advance_to(i + 1),
            Phase::Idle | Phase::Finished => Vec::new(),
        }
    }

    fn advance_to(&mut self, index: usize) -> Vec<SessionEvent> {
        match self.routine.step(index) {
            Some(step) => {
                let text = format!("Starting drill: {}", step.drill_name);
                let secs = step.activity_secs();
                self.announce(&text);
                vec![self.enter(Phase::Activity(index), secs)]
            }
            None => self.finish(),
        }
    }

    fn finish(&mut self) -> Vec<SessionEvent> {
        self.timer.stop();
        self.live_run = None;
        self.paused = false;
        self.phase = Phase::Finished;
        self.announce("Session finished.");
        self.drop_wake_lock();
        info!(routine_id = self.routine.id, "session finished");
        vec![SessionEvent::SessionFinished {
            session_id: self.session_id,
            routine_id: self.routine.id,
            at: Utc::now(),
        }]
    }

    /// Switch to `phase` with a fresh timer run. A paused session stays
    /// paused in the new phase.
    fn enter(&mut self, phase: Phase, duration_secs: u64) -> SessionEvent {
        self.phase = phase;
        let run = self.timer.restart(duration_secs, !self.paused);
        self.live_run = Some(run);
        debug!(?phase, duration_secs, run = run.get(), "phase started");
        // The timer only ticks once a second has passed, so the starting
        // value gets its cue here.
        if matches!(phase, Phase::Activity(_) | Phase::Rest(_)) {
            self.countdown_cue(self.timer.remaining_secs());
        }
        SessionEvent::PhaseStarted {
            phase,
            duration_secs: self.timer.duration_secs(),
            run,
            at: Utc::now(),
        }
    }

    // ── Cues ─────────────────────────────────────────────────────────

    fn countdown_cue(&mut self, remaining_secs: u64) {
        if self.paused || !self.toggles.audio_cues.is_on() {
            return;
        }
        let tone = match self.phase {
            Phase::Activity(_) if remaining_secs <= self.cues.activity_warning_secs => {
                Some(self.warning_tone())
            }
            Phase::Rest(_) if remaining_secs == self.cues.rest_go_secs => Some(self.go_tone()),
            Phase::Rest(_) if remaining_secs <= self.cues.rest_warning_secs => {
                Some(self.warning_tone())
            }
            _ => None,
        };
        if let Some(tone) = tone {
            self.beep(tone);
        }
    }

    fn warning_tone(&self) -> Tone {
        Tone::new(self.cues.warning_tone_hz, self.cues.warning_tone_ms)
    }

    fn go_tone(&self) -> Tone {
        Tone::new(self.cues.go_tone_hz, self.cues.go_tone_ms)
    }

    fn beep(&mut self, tone: Tone) {
        if self.toggles.audio_cues.is_on() {
            self.effects.beep(tone);
        }
    }

    fn announce(&mut self, text: &str) {
        let delay = Duration::from_millis(self.cues.announce_delay_ms);
        self.effects.announce(text, delay);
    }

    fn hold_wake_lock(&mut self) {
        if !self.wants_wake_lock {
            self.wants_wake_lock = true;
            self.effects.acquire_wake_lock();
        }
    }

    fn drop_wake_lock(&mut self) {
        if self.wants_wake_lock {
            self.wants_wake_lock = false;
            self.effects.release_wake_lock();
        }
    }

    fn preferences_changed(&self) -> SessionEvent {
        let prefs = self.toggles.snapshot();
        SessionEvent::PreferencesChanged {
            announcements_enabled: prefs.announcements_enabled,
            audio_cues_enabled: prefs.audio_cues_enabled,
        }
    }
}

impl<E: SessionEffects> Drop for SessionMachine<E> {
    fn drop(&mut self) {
        if self.phase.is_countdown() {
            self.effects.cancel_announcements();
        }
        self.drop_wake_lock();
    }
}

impl<E: SessionEffects + std::fmt::Debug> std::fmt::Debug for SessionMachine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMachine")
            .field("session_id", &self.session_id)
            .field("routine_id", &self.routine.id)
            .field("phase", &self.phase)
            .field("paused", &self.paused)
            .field("live_run", &self.live_run)
            .field("effects", &self.effects)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::effects::testing::{Effect, RecordingEffects};
    use super::*;
    use crate::routine::fixtures::{step, two_step};

    fn machine(routine: Routine) -> SessionMachine<RecordingEffects> {
        let toggles = SessionToggles::from_preferences(&Preferences {
            announcements_enabled: true,
            audio_cues_enabled: true,
        });
        SessionMachine::new(
            routine,
            CueConfig::default(),
            toggles,
            RecordingEffects::default(),
        )
    }

    /// Phases entered (with their durations) until the machine finishes.
    fn run_to_end(m: &mut SessionMachine<RecordingEffects>) -> Vec<(Phase, u64)> {
        let mut seen = Vec::new();
        let collect = |events: Vec<SessionEvent>, seen: &mut Vec<(Phase, u64)>| {
            for e in events {
                match e {
                    SessionEvent::PhaseStarted {
                        phase,
                        duration_secs,
                        ..
                    } => seen.push((phase, duration_secs)),
                    SessionEvent::SessionFinished { .. } => seen.push((Phase::Finished, 0)),
                    _ => {}
                }
            }
        };
        collect(m.start().unwrap(), &mut seen);
        for _ in 0..1000 {
            if m.is_finished() {
                break;
            }
            collect(m.poll(Duration::from_secs(1)), &mut seen);
        }
        seen
    }

    #[test]
    fn two_step_routine_phase_sequence() {
        let mut m = machine(two_step());
        assert_eq!(
            run_to_end(&mut m),
            vec![
                (Phase::Prep, 3),
                (Phase::Activity(0), 10),
                (Phase::Activity(1), 5),
                (Phase::Rest(1), 3),
                (Phase::Finished, 0),
            ]
        );
        assert_eq!(m.current_step_index(), 2);
        assert_eq!(m.effects().acquires, 1);
        assert_eq!(m.effects().releases, 1);
        assert!(!m.effects().lock_held);
    }

    #[test]
    fn rep_counted_step_ticks_once() {
        let mut reps = step(0, "Lunges", 0, None);
        reps.reps_target = Some(10);
        let mut m = machine(Routine::new(1, "Legs", vec![reps]));

        assert_eq!(
            run_to_end(&mut m),
            vec![(Phase::Prep, 3), (Phase::Activity(0), 1), (Phase::Finished, 0)]
        );
        assert_eq!(m.routine().step(0).unwrap().target_display(), "10 reps");
    }

    #[test]
    fn empty_routine_cannot_start() {
        let mut m = machine(Routine::new(2, "Nothing", Vec::new()));
        let err = m.start().unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
        assert_eq!(m.phase(), Phase::Idle);
        assert_eq!(m.effects().acquires, 0);
        assert!(m.effects().log.is_empty());
    }

    #[test]
    fn skip_into_rest_matches_natural_completion() {
        let routine = || {
            Routine::new(
                3,
                "Drives",
                vec![step(0, "Drives", 30, Some(4)), step(1, "Boasts", 20, None)],
            )
        };

        let mut skipped = machine(routine());
        skipped.start().unwrap();
        skipped.poll(Duration::from_secs(3));
        assert_eq!(skipped.phase(), Phase::Activity(0));
        let before = skipped.live_run();
        skipped.skip();

        let mut natural = machine(routine());
        natural.start().unwrap();
        natural.poll(Duration::from_secs(3));
        natural.poll(Duration::from_secs(30));

        assert_eq!(skipped.phase(), Phase::Rest(0));
        assert_eq!(skipped.remaining_secs(), 4);
        assert!(skipped.live_run() > before);
        assert_eq!(natural.phase(), Phase::Rest(0));
        assert_eq!(natural.remaining_secs(), 4);
        assert_eq!(
            skipped.effects().announcements().last(),
            natural.effects().announcements().last()
        );
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut m = machine(two_step());
        m.start().unwrap();
        m.poll(Duration::from_secs(3));
        let old = m.live_run().unwrap();
        m.skip();
        assert_eq!(m.phase(), Phase::Activity(1));

        let late = TimerEvent {
            run: old,
            signal: TimerSignal::Complete,
        };
        assert!(m.handle_timer(late).is_empty());
        assert_eq!(m.phase(), Phase::Activity(1));
        assert_eq!(m.remaining_secs(), 5);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let mut m = machine(two_step());
        m.start().unwrap();
        m.poll(Duration::from_secs(3));
        m.poll(Duration::from_secs(1));

        assert!(m.pause().is_some());
        assert!(m.pause().is_none());
        assert_eq!(m.effects().releases, 1);

        assert!(m.poll(Duration::from_secs(60)).is_empty());
        assert_eq!(m.remaining_secs(), 9);

        m.effects_mut().clear();
        assert!(m.resume().is_some());
        assert!(m.resume().is_none());
        assert_eq!(m.effects().acquires, 2);
        assert!(m.effects().announcements().is_empty());
        assert_eq!(m.remaining_secs(), 9);
    }

    #[test]
    fn pause_cancels_speech_and_skip_is_rejected_while_paused() {
        let mut m = machine(two_step());
        m.start().unwrap();
        m.effects_mut().clear();

        m.pause();
        assert!(m.effects().log.contains(&Effect::CancelSpeech));
        assert!(m.skip().is_empty());
        assert_eq!(m.phase(), Phase::Prep);
    }

    #[test]
    fn skip_before_start_is_rejected() {
        let mut m = machine(two_step());
        assert!(m.skip().is_empty());
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn announcements_follow_transitions() {
        let mut m = machine(two_step());
        run_to_end(&mut m);
        assert_eq!(
            m.effects().announcements(),
            vec![
                "Starting with: Ghosting",
                "Starting drill: Ghosting",
                "Starting drill: Shadow Swings",
                "Rest. Session finishes after this rest.",
                "Session finished.",
            ]
        );
    }

    #[test]
    fn countdown_tones() {
        let cues = CueConfig::default();
        let warning = Tone::new(cues.warning_tone_hz, cues.warning_tone_ms);
        let go = Tone::new(cues.go_tone_hz, cues.go_tone_ms);

        let mut m = machine(Routine::new(
            4,
            "Tones",
            vec![step(0, "Drives", 5, Some(4)), step(1, "Volleys", 5, None)],
        ));
        m.start().unwrap();
        m.poll(Duration::from_secs(2));
        assert!(m.effects().beeps().is_empty(), "prep never ticks");

        m.poll(Duration::from_secs(1));
        assert_eq!(m.effects().beeps(), vec![go]);

        m.effects_mut().clear();
        m.poll(Duration::from_secs(5));
        assert_eq!(m.phase(), Phase::Rest(0));
        assert_eq!(m.effects().beeps(), vec![warning, warning, warning]);

        m.effects_mut().clear();
        m.poll(Duration::from_secs(3));
        assert_eq!(m.effects().beeps(), vec![warning, warning, go]);
    }

    #[test]
    fn one_second_rest_still_plays_go_tone() {
        let cues = CueConfig::default();
        let go = Tone::new(cues.go_tone_hz, cues.go_tone_ms);

        let mut m = machine(Routine::new(
            6,
            "Short rest",
            vec![step(0, "Drives", 5, Some(1)), step(1, "Volleys", 5, None)],
        ));
        m.start().unwrap();
        m.poll(Duration::from_secs(3));
        m.poll(Duration::from_secs(4));
        m.effects_mut().clear();

        m.poll(Duration::from_secs(1));
        assert_eq!(m.phase(), Phase::Rest(0));
        assert_eq!(m.effects().beeps(), vec![go]);

        m.effects_mut().clear();
        m.poll(Duration::from_secs(1));
        assert_eq!(m.phase(), Phase::Activity(1));
        assert!(m.effects().beeps().is_empty());
    }

    #[test]
    fn short_activity_warns_on_every_second() {
        let cues = CueConfig::default();
        let warning = Tone::new(cues.warning_tone_hz, cues.warning_tone_ms);
        let go = Tone::new(cues.go_tone_hz, cues.go_tone_ms);

        let mut m = machine(Routine::new(8, "Quick", vec![step(0, "Lunges", 3, None)]));
        m.start().unwrap();
        m.poll(Duration::from_secs(3));
        assert_eq!(m.phase(), Phase::Activity(0));
        assert_eq!(m.effects().beeps(), vec![go, warning]);

        m.poll(Duration::from_secs(1));
        m.poll(Duration::from_secs(1));
        assert_eq!(m.effects().beeps(), vec![go, warning, warning, warning]);
    }

    #[test]
    fn disabled_audio_cues_are_silent() {
        let mut m = machine(two_step());
        m.set_audio_cues(false);
        run_to_end(&mut m);
        assert!(m.effects().beeps().is_empty());
    }

    #[test]
    fn disabling_announcements_cancels_speech() {
        let mut m = machine(two_step());
        m.start().unwrap();
        m.effects_mut().clear();
        let event = m.set_announcements(false);
        assert_eq!(
            event,
            SessionEvent::PreferencesChanged {
                announcements_enabled: false,
                audio_cues_enabled: true,
            }
        );
        assert_eq!(m.effects().log, vec![Effect::CancelSpeech]);
    }

    #[test]
    fn abandon_releases_wake_lock() {
        let mut m = machine(two_step());
        m.start().unwrap();
        m.poll(Duration::from_secs(5));

        let event = m.abandon();
        assert!(matches!(event, Some(SessionEvent::SessionAbandoned { .. })));
        assert!(!m.effects().lock_held);
        assert!(m.poll(Duration::from_secs(30)).is_empty());
        assert!(m.abandon().is_none());
    }

    #[test]
    fn paused_session_finishing_releases_lock_once() {
        let mut m = machine(Routine::new(5, "One", vec![step(0, "Drives", 2, None)]));
        m.start().unwrap();
        m.poll(Duration::from_secs(3));
        m.pause();
        m.resume();
        m.skip();
        assert!(m.is_finished());
        assert_eq!(m.effects().acquires, m.effects().releases);
    }
}
