//! Async driver for a [`SessionMachine`].
//!
//! Ticks the machine from tokio's monotonic clock, applies user controls
//! arriving on a channel, and publishes every [`SessionEvent`] to the
//! front end. Controls and ticks are handled one at a time, so the machine
//! never sees two triggers concurrently.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use super::effects::SessionEffects;
use super::machine::SessionMachine;
use super::view::SessionView;
use crate::error::SessionError;
use crate::events::SessionEvent;

/// User input to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Pause,
    Resume,
    TogglePause,
    Skip,
    ToggleAnnouncements,
    ToggleAudioCues,
    /// Leave the player. Abandons the session if it is still running.
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every step played; the survey for `routine_id` is next.
    Finished { session_id: Uuid, routine_id: u64 },
    Abandoned,
}

pub struct SessionRunner<E: SessionEffects> {
    machine: SessionMachine<E>,
    tick_every: Duration,
    views: Option<watch::Sender<SessionView>>,
}

impl<E: SessionEffects> SessionRunner<E> {
    pub fn new(machine: SessionMachine<E>) -> Self {
        Self {
            machine,
            tick_every: Duration::from_millis(250),
            views: None,
        }
    }

    /// How often elapsed time is fed to the timer. Shorter intervals make
    /// second boundaries land closer to wall time.
    pub fn with_tick_interval(mut self, every: Duration) -> Self {
        self.tick_every = every;
        self
    }

    /// Publish a fresh [`SessionView`] whenever the machine emits events.
    pub fn with_views(mut self, views: watch::Sender<SessionView>) -> Self {
        views.send_replace(self.machine.view());
        self.views = Some(views);
        self
    }

    pub fn machine(&self) -> &SessionMachine<E> {
        &self.machine
    }

    /// Drive the session until it finishes or the user quits.
    ///
    /// A closed control channel counts as `Quit`. A closed event channel is
    /// ignored. Fails only when `Start` is sent for a routine without steps.
    pub async fn run(
        mut self,
        mut controls: mpsc::Receiver<Control>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Outcome, SessionError> {
        let mut ticker = time::interval(self.tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let batch = self.machine.poll(now - last);
                    self.publish(&events, batch);
                    last = now;
                }
                control = controls.recv() => {
                    // Settle time elapsed so far before applying the control.
                    let now = Instant::now();
                    let batch = self.machine.poll(now - last);
                    self.publish(&events, batch);
                    last = now;

                    let control = control.unwrap_or(Control::Quit);
                    debug!(?control, phase = ?self.machine.phase(), "control");
                    if control == Control::Quit {
                        if self.machine.is_finished() {
                            break;
                        }
                        let batch = self.machine.abandon().into_iter().collect();
                        self.publish(&events, batch);
                        info!("player closed before the session finished");
                        return Ok(Outcome::Abandoned);
                    }
                    let batch = self.apply(control)?;
                    self.publish(&events, batch);
                }
            }

            if self.machine.is_finished() {
                break;
            }
        }

        Ok(Outcome::Finished {
            session_id: self.machine.session_id(),
            routine_id: self.machine.routine().id,
        })
    }

    fn publish(&self, events: &mpsc::UnboundedSender<SessionEvent>, batch: Vec<SessionEvent>) {
        if batch.is_empty() {
            return;
        }
        for event in batch {
            let _ = events.send(event);
        }
        if let Some(views) = &self.views {
            views.send_replace(self.machine.view());
        }
    }

    fn apply(&mut self, control: Control) -> Result<Vec<SessionEvent>, SessionError> {
        let m = &mut self.machine;
        let events = match control {
            Control::Start => m.start()?,
            Control::Pause => m.pause().into_iter().collect(),
            Control::Resume => m.resume().into_iter().collect(),
            Control::TogglePause => m.toggle_pause().into_iter().collect(),
            Control::Skip => m.skip(),
            Control::ToggleAnnouncements => {
                let on = !m.toggles().announcements.is_on();
                vec![m.set_announcements(on)]
            }
            Control::ToggleAudioCues => {
                let on = !m.toggles().audio_cues.is_on();
                vec![m.set_audio_cues(on)]
            }
            Control::Quit => Vec::new(),
        };
        Ok(events)
    }
}
