//! Tone generation for countdown cues.
//!
//! The output device is opened lazily on the first beep and then kept for
//! the life of the generator. If it cannot be opened, every later beep is a
//! silent no-op; tones are an enhancement, never a requirement.

use std::io::Write;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, warn};

use super::{spawn_delayed, CueSwitch};
use crate::error::ResourceError;

/// A single tone with frequency and duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Frequency in Hz
    pub frequency_hz: f32,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl Tone {
    pub fn new(frequency_hz: f32, duration_ms: u64) -> Self {
        Self {
            frequency_hz,
            duration_ms,
        }
    }
}

/// Somewhere tones can be played.
pub trait ToneSink: Send + Sync {
    fn play(&self, tone: Tone) -> Result<(), ResourceError>;
}

type SinkFactory = Box<dyn Fn() -> Result<Box<dyn ToneSink>, ResourceError> + Send + Sync>;

struct Inner {
    factory: SinkFactory,
    sink: OnceLock<Option<Box<dyn ToneSink>>>,
}

impl Inner {
    fn sink(&self) -> Option<&dyn ToneSink> {
        self.sink
            .get_or_init(|| match (self.factory)() {
                Ok(sink) => Some(sink),
                Err(e) => {
                    warn!("audio output unavailable, tones disabled: {e}");
                    None
                }
            })
            .as_deref()
    }

    fn play(&self, tone: Tone) {
        let Some(sink) = self.sink() else {
            return;
        };
        if let Err(e) = sink.play(tone) {
            warn!("tone playback failed: {e}");
        }
    }
}

/// Owner of the process-wide tone output.
#[derive(Clone)]
pub struct BeepGenerator {
    inner: Arc<Inner>,
}

impl BeepGenerator {
    /// Build a generator whose sink is created by `factory` on first use.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn ToneSink>, ResourceError> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                factory: Box::new(factory),
                sink: OnceLock::new(),
            }),
        }
    }

    /// Default output for this build: the audio device with the `audio`
    /// feature, the terminal bell otherwise.
    pub fn platform() -> Self {
        #[cfg(feature = "audio")]
        {
            Self::new(|| rodio_sink::RodioSink::open().map(|s| Box::new(s) as Box<dyn ToneSink>))
        }
        #[cfg(not(feature = "audio"))]
        {
            Self::new(|| Ok(Box::new(TerminalBell) as Box<dyn ToneSink>))
        }
    }

    /// Play `tone` after `delay` if `enabled` is on when it fires.
    pub fn beep(&self, enabled: &CueSwitch, tone: Tone, delay: Duration) {
        if !enabled.is_on() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let enabled = enabled.clone();
        spawn_delayed(delay, move || {
            if !enabled.is_on() {
                debug!("tone dropped, audio cues disabled while pending");
                return;
            }
            inner.play(tone);
        });
    }

    /// Whether the output has been created successfully so far.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner.sink.get(), Some(Some(_)))
    }
}

impl std::fmt::Debug for BeepGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeepGenerator")
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Fallback sink: rings the terminal bell, ignoring pitch and length.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl ToneSink for TerminalBell {
    fn play(&self, _tone: Tone) -> Result<(), ResourceError> {
        let mut stderr = std::io::stderr();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(|e| ResourceError::Audio(e.to_string()))
    }
}

#[cfg(feature = "audio")]
mod rodio_sink {
    use std::sync::mpsc::{self, Sender};
    use std::sync::Mutex;
    use std::time::Duration;

    use rodio::source::SineWave;
    use rodio::{OutputStream, Sink, Source};
    use tracing::warn;

    use super::{Tone, ToneSink};
    use crate::error::ResourceError;

    const VOLUME: f32 = 0.3;

    /// Sine tones on the default output device.
    ///
    /// `OutputStream` must stay on the thread that opened it, so a dedicated
    /// thread owns the stream and plays tones sent over a channel.
    pub struct RodioSink {
        tx: Mutex<Sender<Tone>>,
    }

    impl RodioSink {
        pub fn open() -> Result<Self, ResourceError> {
            let (tx, rx) = mpsc::channel::<Tone>();
            let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

            std::thread::Builder::new()
                .name("solosync-audio".into())
                .spawn(move || {
                    let (_stream, handle) = match OutputStream::try_default() {
                        Ok(pair) => {
                            let _ = ready_tx.send(Ok(()));
                            pair
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.to_string()));
                            return;
                        }
                    };
                    for tone in rx {
                        match Sink::try_new(&handle) {
                            Ok(sink) => {
                                let source = SineWave::new(tone.frequency_hz)
                                    .take_duration(Duration::from_millis(tone.duration_ms))
                                    .amplify(VOLUME);
                                sink.append(source);
                                sink.detach();
                            }
                            Err(e) => warn!("failed to create audio sink: {e}"),
                        }
                    }
                })
                .map_err(|e| ResourceError::Audio(e.to_string()))?;

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Self { tx: Mutex::new(tx) }),
                Ok(Err(e)) => Err(ResourceError::Audio(e)),
                Err(e) => Err(ResourceError::Audio(e.to_string())),
            }
        }
    }

    impl ToneSink for RodioSink {
        fn play(&self, tone: Tone) -> Result<(), ResourceError> {
            let tx = self
                .tx
                .lock()
                .map_err(|_| ResourceError::Audio("audio channel poisoned".into()))?;
            tx.send(tone)
                .map_err(|_| ResourceError::Audio("audio thread stopped".into()))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Sink that records every tone it is asked to play.
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub played: Arc<Mutex<Vec<Tone>>>,
    }

    impl RecordingSink {
        pub fn tones(&self) -> Vec<Tone> {
            self.played.lock().unwrap().clone()
        }
    }

    impl ToneSink for RecordingSink {
        fn play(&self, tone: Tone) -> Result<(), ResourceError> {
            self.played.lock().unwrap().push(tone);
            Ok(())
        }
    }
}
