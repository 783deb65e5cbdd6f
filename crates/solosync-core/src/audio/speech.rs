//! Spoken announcements.
//!
//! Announcements are cancel-and-replace: a new announcement first silences
//! whatever is still being spoken, and a pending delayed announcement is
//! dropped if anything else is announced or cancelled before it fires.

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use super::{spawn_delayed, CueSwitch};
use crate::error::ResourceError;
use crate::storage::SpeechConfig;

/// Platform text-to-speech.
pub trait SpeechBackend: Send {
    /// False when the platform has no usable speech capability.
    fn is_available(&self) -> bool;

    /// Start speaking `text`. Must not block until speech ends.
    fn speak(&mut self, text: &str) -> Result<(), ResourceError>;

    /// Stop any utterance in progress.
    fn cancel(&mut self);
}

type SharedBackend = Arc<Mutex<Box<dyn SpeechBackend>>>;

fn lock(backend: &SharedBackend) -> MutexGuard<'_, Box<dyn SpeechBackend>> {
    backend.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Speaks phase-change cues through a [`SpeechBackend`].
#[derive(Clone)]
pub struct Announcer {
    backend: SharedBackend,
    enabled: CueSwitch,
    /// Bumped on every announce/cancel; a delayed utterance only fires if
    /// the generation it was scheduled under is still current.
    generation: Arc<AtomicU64>,
}

impl Announcer {
    pub fn new(backend: Box<dyn SpeechBackend>, enabled: CueSwitch) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            enabled,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel whatever is being spoken and speak `text` after `delay`.
    ///
    /// No-op when announcements are disabled, `text` is blank, or the
    /// platform cannot speak.
    pub fn announce(&self, text: &str, delay: Duration) {
        if !self.enabled.is_on() || text.trim().is_empty() {
            debug!(text, "announcement skipped");
            return;
        }
        if !lock(&self.backend).is_available() {
            debug!(text, "announcement skipped, speech unavailable");
            return;
        }

        let scheduled = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.backend).cancel();

        let backend = Arc::clone(&self.backend);
        let generation = Arc::clone(&self.generation);
        let enabled = self.enabled.clone();
        let text = text.to_string();
        spawn_delayed(delay, move || {
            if generation.load(Ordering::SeqCst) != scheduled || !enabled.is_on() {
                debug!(%text, "announcement superseded before it fired");
                return;
            }
            debug!(%text, "speaking");
            if let Err(e) = lock(&backend).speak(&text) {
                warn!("announcement failed: {e}");
            }
        });
    }

    /// Silence speech now and drop any pending announcement.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        lock(&self.backend).cancel();
    }
}

impl std::fmt::Debug for Announcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Announcer")
            .field("enabled", &self.enabled.is_on())
            .finish()
    }
}

/// Speech through an external synthesizer process (`espeak-ng`, `say`).
///
/// Each utterance is one child process; cancelling kills it.
#[derive(Debug)]
pub struct CommandSpeech {
    program: Option<String>,
    args: Vec<String>,
    current: Option<Child>,
    available: bool,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: Some(program.into()),
            args,
            current: None,
            available: true,
        }
    }

    /// Configured command, or the platform default.
    pub fn from_config(config: &SpeechConfig) -> Self {
        let program = config.command.clone().or_else(Self::platform_default);
        Self {
            available: program.is_some(),
            program,
            args: config.args.clone(),
            current: None,
        }
    }

    fn platform_default() -> Option<String> {
        if cfg!(target_os = "macos") {
            Some("say".into())
        } else if cfg!(target_os = "linux") {
            Some("espeak-ng".into())
        } else {
            None
        }
    }
}

impl SpeechBackend for CommandSpeech {
    fn is_available(&self) -> bool {
        self.available
    }

    fn speak(&mut self, text: &str) -> Result<(), ResourceError> {
        let Some(program) = self.program.clone() else {
            return Err(ResourceError::SpeechUnavailable);
        };
        self.cancel();
        let child = Command::new(&program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match child {
            Ok(child) => {
                self.current = Some(child);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("speech command '{program}' not found, announcements disabled");
                self.available = false;
                Err(ResourceError::SpeechUnavailable)
            }
            Err(e) => Err(ResourceError::Speech(e.to_string())),
        }
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.current.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}

impl Drop for CommandSpeech {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SpeechCall {
        Speak(String),
        Cancel,
    }

    /// Backend that records calls instead of speaking.
    #[derive(Clone)]
    pub struct ScriptedSpeech {
        pub available: bool,
        pub calls: Arc<Mutex<Vec<SpeechCall>>>,
    }

    impl ScriptedSpeech {
        pub fn new(available: bool) -> Self {
            Self {
                available,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn spoken(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| match c {
                    SpeechCall::Speak(text) => Some(text.clone()),
                    SpeechCall::Cancel => None,
                })
                .collect()
        }

        pub fn calls(&self) -> Vec<SpeechCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SpeechBackend for ScriptedSpeech {
        fn is_available(&self) -> bool {
            self.available
        }

        fn speak(&mut self, text: &str) -> Result<(), ResourceError> {
            self.calls
                .lock()
                .unwrap()
                .push(SpeechCall::Speak(text.to_string()));
            Ok(())
        }

        fn cancel(&mut self) {
            self.calls.lock().unwrap().push(SpeechCall::Cancel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedSpeech, SpeechCall};
    use super::*;

    fn announcer(speech: &ScriptedSpeech, on: bool) -> Announcer {
        Announcer::new(Box::new(speech.clone()), CueSwitch::new(on))
    }

    #[test]
    fn announce_cancels_then_speaks() {
        let speech = ScriptedSpeech::new(true);
        announcer(&speech, true).announce("Starting drill: Drives", Duration::ZERO);
        assert_eq!(
            speech.calls(),
            vec![
                SpeechCall::Cancel,
                SpeechCall::Speak("Starting drill: Drives".into())
            ]
        );
    }

    #[test]
    fn disabled_empty_or_unavailable_is_noop() {
        let speech = ScriptedSpeech::new(true);
        announcer(&speech, false).announce("Rest", Duration::ZERO);
        announcer(&speech, true).announce("   ", Duration::ZERO);
        assert!(speech.calls().is_empty());

        let mute = ScriptedSpeech::new(false);
        announcer(&mute, true).announce("Rest", Duration::ZERO);
        assert!(mute.calls().is_empty());
    }

    #[test]
    fn newer_announcement_drops_pending_one() {
        let speech = ScriptedSpeech::new(true);
        let a = announcer(&speech, true);

        a.announce("first", Duration::from_millis(80));
        a.announce("second", Duration::ZERO);
        std::thread::sleep(Duration::from_millis(250));

        assert_eq!(speech.spoken(), vec!["second".to_string()]);
    }

    #[test]
    fn cancel_drops_pending_announcement() {
        let speech = ScriptedSpeech::new(true);
        let a = announcer(&speech, true);

        a.announce("later", Duration::from_millis(50));
        a.cancel();
        std::thread::sleep(Duration::from_millis(200));

        assert!(speech.spoken().is_empty());
    }

    #[test]
    fn missing_program_marks_backend_unavailable() {
        let mut speech = CommandSpeech::new("solosync-no-such-speech-binary", Vec::new());
        assert!(speech.is_available());
        assert_eq!(speech.speak("hello"), Err(ResourceError::SpeechUnavailable));
        assert!(!speech.is_available());
    }
}
