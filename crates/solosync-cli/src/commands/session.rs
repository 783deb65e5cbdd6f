use std::io::Write;

use clap::Subcommand;
use solosync_core::api::SessionLogPayload;
use solosync_core::error::format_field_errors;
use solosync_core::survey::{metric_prompts, MAX_DIFFICULTY, MIN_DIFFICULTY};
use solosync_core::timer::Phase;
use solosync_core::{
    ApiError, Config, Control, Outcome, PlatformEffects, Routine, SessionEvent, SessionMachine,
    SessionRunner, SessionToggles, SessionView, SurveyDraft,
};
use tokio::sync::{mpsc, watch};

use super::InputLines;

const CONTROLS_HELP: &str =
    "controls: [enter] pause/resume   s skip   a announcements   b beeps   q quit";

#[derive(Subcommand)]
pub enum SessionAction {
    /// Play an assigned routine with spoken and audible cues
    Play {
        /// Routine ID
        routine_id: u64,
        /// Do not ask for the post-session survey
        #[arg(long)]
        no_survey: bool,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SessionAction::Play {
            routine_id,
            no_survey,
        } => play(routine_id, no_survey),
    }
}

fn play(routine_id: u64, no_survey: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    let api = super::api_client(&config)?;
    let rt = super::runtime()?;

    let routine = rt.block_on(api.fetch_routine(routine_id))?;
    let toggles = SessionToggles::from_preferences(&config.preferences);
    let effects = PlatformEffects::from_config(&config, &toggles);
    let machine = SessionMachine::new(routine.clone(), config.cues.clone(), toggles.clone(), effects);

    let (view_tx, view_rx) = watch::channel(machine.view());
    let runner = SessionRunner::new(machine).with_views(view_tx);
    let (control_tx, control_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    control_tx.try_send(Control::Start)?;

    println!("{}", routine.name);
    println!("{CONTROLS_HELP}");

    let mut input = InputLines::stdin();
    let outcome = rt.block_on(async {
        let render = tokio::spawn(render(view_rx, event_rx));
        let outcome = tokio::select! {
            outcome = runner.run(control_rx, event_tx) => outcome,
            () = forward_controls(&mut input, control_tx) => Ok(Outcome::Abandoned),
        };
        let _ = render.await;
        outcome
    })?;

    let preferences = toggles.snapshot();
    if preferences != config.preferences {
        config.store_preferences(preferences)?;
    }

    match outcome {
        Outcome::Abandoned => {
            println!("session abandoned, nothing logged");
            Ok(())
        }
        Outcome::Finished { .. } if no_survey => Ok(()),
        Outcome::Finished { .. } => {
            let payload = survey(&mut input, &routine)?;
            match rt.block_on(api.submit_log(&payload)) {
                Ok(()) => {
                    println!("session logged");
                    Ok(())
                }
                Err(ApiError::Validation(fields)) => {
                    Err(format!("session log rejected:\n{}", format_field_errors(&fields)).into())
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Map typed lines to controls until the session ends. When stdin closes
/// the session keeps playing to the end.
async fn forward_controls(input: &mut InputLines, controls: mpsc::Sender<Control>) {
    while let Some(line) = input.next().await {
        match parse_control(&line) {
            Some(control) => {
                if controls.send(control).await.is_err() {
                    return;
                }
            }
            None => eprintln!("{CONTROLS_HELP}"),
        }
    }
    controls.closed().await;
}

pub(crate) fn parse_control(line: &str) -> Option<Control> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "p" | "pause" => Some(Control::TogglePause),
        "r" | "resume" => Some(Control::Resume),
        "s" | "skip" => Some(Control::Skip),
        "a" => Some(Control::ToggleAnnouncements),
        "b" => Some(Control::ToggleAudioCues),
        "q" | "quit" => Some(Control::Quit),
        _ => None,
    }
}

async fn render(
    mut views: watch::Receiver<SessionView>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    let mut shown = Phase::Idle;
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                if view.phase != shown {
                    shown = view.phase;
                    print_header(&view);
                }
                if view.phase.is_countdown() {
                    print!("\r\x1b[2K{}", status_line(&view));
                    let _ = std::io::stdout().flush();
                }
            }
            event = events.recv() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }
    println!();
}

fn print_header(view: &SessionView) {
    println!();
    match view.phase {
        Phase::Activity(_) => {
            println!("{}  {}", view.position, view.title);
            println!("  Target: {}   Notes: {}", view.target, view.notes);
        }
        Phase::Rest(_) | Phase::Prep => println!("{}", view.title),
        Phase::Idle | Phase::Finished => {}
    }
}

pub(crate) fn status_line(view: &SessionView) -> String {
    let mut line = format!("{} {}", view.phase_label, view.remaining);
    if !view.next_up.is_empty() {
        line.push_str(&format!("   {}", view.next_up));
    }
    if view.is_paused {
        line.push_str("   [paused]");
    }
    line
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::SessionFinished { .. } => println!("\nSession finished."),
        SessionEvent::PreferencesChanged {
            announcements_enabled,
            audio_cues_enabled,
        } => println!(
            "\nannouncements {}, beeps {}",
            on_off(*announcements_enabled),
            on_off(*audio_cues_enabled)
        ),
        _ => {}
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

fn survey(
    input: &mut InputLines,
    routine: &Routine,
) -> Result<SessionLogPayload, Box<dyn std::error::Error>> {
    println!();
    println!("How did it go?");
    let mut draft = SurveyDraft::new();
    loop {
        let answer = input
            .prompt(&format!(
                "Difficulty ({MIN_DIFFICULTY} very easy .. {MAX_DIFFICULTY} very hard): "
            ))
            .ok_or("input closed before the survey was complete")?;
        match answer.trim().parse::<u8>() {
            Ok(d) if (MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&d) => {
                draft.set_difficulty(d);
                break;
            }
            _ => println!("enter a number from {MIN_DIFFICULTY} to {MAX_DIFFICULTY}"),
        }
    }
    let notes = input.prompt("Notes (optional): ").unwrap_or_default();
    draft.set_notes(notes.trim());

    for prompt in metric_prompts(routine) {
        let value = input
            .prompt(&format!("{} - {}: ", prompt.drill_name, prompt.label()))
            .unwrap_or_default();
        draft.set_metric(prompt.drill_id, &prompt.metric_name, value);
    }
    Ok(draft.into_payload(routine)?)
}
