//! Audible cues: short tones and spoken announcements.
//!
//! Both components are fire-and-forget. Delayed cues run on the tokio
//! runtime when one is present, otherwise on a short-lived thread, and
//! re-check their enabled switch when they fire.

pub mod beep;
pub mod speech;

pub use beep::{BeepGenerator, TerminalBell, Tone, ToneSink};
pub use speech::{Announcer, CommandSpeech, SpeechBackend};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared on/off flag, read at the moment a cue fires.
#[derive(Debug, Clone)]
pub struct CueSwitch(Arc<AtomicBool>);

impl CueSwitch {
    pub fn new(on: bool) -> Self {
        Self(Arc::new(AtomicBool::new(on)))
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, on: bool) {
        self.0.store(on, Ordering::SeqCst);
    }
}

/// Run `f` after `delay` without blocking the caller.
pub(crate) fn spawn_delayed<F>(delay: Duration, f: F)
where
    F: FnOnce() + Send + 'static,
{
    if delay.is_zero() {
        f();
        return;
    }
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                f();
            });
        }
        Err(_) => {
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                f();
            });
        }
    }
}
