//! Side effects the session machine triggers on transitions.
//!
//! The machine only decides *when* a cue is due; whether it is audible,
//! and what happens when the platform refuses, is up to the effects.

use std::time::Duration;

use crate::audio::{Announcer, BeepGenerator, CommandSpeech, CueSwitch, Tone};
use crate::storage::{Config, Preferences};
use crate::wake_lock::WakeLockManager;

pub trait SessionEffects {
    /// Cancel any speech in progress and speak `text` after `delay`.
    fn announce(&mut self, text: &str, delay: Duration);

    fn cancel_announcements(&mut self);

    fn beep(&mut self, tone: Tone);

    fn acquire_wake_lock(&mut self);

    fn release_wake_lock(&mut self);
}

/// The two persisted player toggles as live switches, shared between the
/// machine and the cue components.
#[derive(Debug, Clone)]
pub struct SessionToggles {
    pub announcements: CueSwitch,
    pub audio_cues: CueSwitch,
}

impl SessionToggles {
    pub fn from_preferences(preferences: &Preferences) -> Self {
        Self {
            announcements: CueSwitch::new(preferences.announcements_enabled),
            audio_cues: CueSwitch::new(preferences.audio_cues_enabled),
        }
    }

    /// Current values, for persisting.
    pub fn snapshot(&self) -> Preferences {
        Preferences {
            announcements_enabled: self.announcements.is_on(),
            audio_cues_enabled: self.audio_cues.is_on(),
        }
    }
}

impl Default for SessionToggles {
    fn default() -> Self {
        Self::from_preferences(&Preferences::default())
    }
}

/// Real cues: speech process, tone output, screen wake lock.
#[derive(Debug)]
pub struct PlatformEffects {
    announcer: Announcer,
    beeper: BeepGenerator,
    wake_lock: WakeLockManager,
    audio_cues: CueSwitch,
}

impl PlatformEffects {
    pub fn new(
        announcer: Announcer,
        beeper: BeepGenerator,
        wake_lock: WakeLockManager,
        audio_cues: CueSwitch,
    ) -> Self {
        Self {
            announcer,
            beeper,
            wake_lock,
            audio_cues,
        }
    }

    pub fn from_config(config: &Config, toggles: &SessionToggles) -> Self {
        let speech = CommandSpeech::from_config(&config.speech);
        Self::new(
            Announcer::new(Box::new(speech), toggles.announcements.clone()),
            BeepGenerator::platform(),
            WakeLockManager::from_config(&config.wake_lock),
            toggles.audio_cues.clone(),
        )
    }

    pub fn wake_lock_held(&mut self) -> bool {
        self.wake_lock.is_held()
    }
}

impl SessionEffects for PlatformEffects {
    fn announce(&mut self, text: &str, delay: Duration) {
        self.announcer.announce(text, delay);
    }

    fn cancel_announcements(&mut self) {
        self.announcer.cancel();
    }

    fn beep(&mut self, tone: Tone) {
        self.beeper.beep(&self.audio_cues, tone, Duration::ZERO);
    }

    fn acquire_wake_lock(&mut self) {
        self.wake_lock.acquire();
    }

    fn release_wake_lock(&mut self) {
        self.wake_lock.release();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::beep::testing::RecordingSink;
    use crate::audio::speech::testing::ScriptedSpeech;
    use crate::audio::ToneSink;
    use crate::wake_lock::testing::FakeWakeLock;

    fn platform(
        toggles: &SessionToggles,
    ) -> (PlatformEffects, ScriptedSpeech, RecordingSink, FakeWakeLock) {
        let speech = ScriptedSpeech::new(true);
        let sink = RecordingSink::default();
        let lock = FakeWakeLock::default();
        let tone_sink = sink.clone();
        let effects = PlatformEffects::new(
            Announcer::new(Box::new(speech.clone()), toggles.announcements.clone()),
            BeepGenerator::new(move || Ok(Box::new(tone_sink.clone()) as Box<dyn ToneSink>)),
            WakeLockManager::new(Box::new(lock.clone())),
            toggles.audio_cues.clone(),
        );
        (effects, speech, sink, lock)
    }

    #[test]
    fn toggles_gate_platform_cues() {
        let toggles = SessionToggles::from_preferences(&Preferences {
            announcements_enabled: false,
            audio_cues_enabled: false,
        });
        let (mut effects, speech, sink, _) = platform(&toggles);

        effects.announce("Starting drill: Drives", Duration::ZERO);
        effects.beep(Tone::new(880.0, 150));
        assert!(speech.spoken().is_empty());
        assert!(sink.tones().is_empty());

        toggles.announcements.set(true);
        toggles.audio_cues.set(true);
        effects.announce("Starting drill: Drives", Duration::ZERO);
        effects.beep(Tone::new(880.0, 150));
        assert_eq!(speech.spoken(), vec!["Starting drill: Drives".to_string()]);
        assert_eq!(sink.tones(), vec![Tone::new(880.0, 150)]);
    }

    #[test]
    fn wake_lock_passes_through_manager() {
        let toggles = SessionToggles::default();
        let (mut effects, _, _, lock) = platform(&toggles);

        effects.acquire_wake_lock();
        effects.acquire_wake_lock();
        assert!(effects.wake_lock_held());
        effects.release_wake_lock();

        assert_eq!(lock.requests(), 1);
        assert_eq!(lock.releases(), 1);
        assert!(!effects.wake_lock_held());
    }

    #[test]
    fn snapshot_reflects_live_switches() {
        let toggles = SessionToggles::default();
        toggles.announcements.set(true);
        toggles.audio_cues.set(false);
        assert_eq!(
            toggles.snapshot(),
            Preferences {
                announcements_enabled: true,
                audio_cues_enabled: false,
            }
        );
    }
}
