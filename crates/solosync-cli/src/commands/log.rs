use clap::Subcommand;
use solosync_core::error::format_field_errors;
use solosync_core::{ApiError, Config, SurveyDraft};

#[derive(Subcommand)]
pub enum LogAction {
    /// Log a session without playing it
    Submit {
        /// Routine ID
        routine_id: u64,
        /// Physical difficulty, 1 (very easy) to 5 (very hard)
        #[arg(long)]
        difficulty: u8,
        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,
        /// Metric value as DRILL_ID:METRIC=VALUE (repeatable)
        #[arg(long = "metric", value_parser = parse_metric)]
        metrics: Vec<(u64, String, String)>,
    },
}

pub fn run(action: LogAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        LogAction::Submit {
            routine_id,
            difficulty,
            notes,
            metrics,
        } => {
            let config = Config::load()?;
            let api = super::api_client(&config)?;
            let rt = super::runtime()?;
            let routine = rt.block_on(api.fetch_routine(routine_id))?;

            let mut draft = SurveyDraft::new();
            draft.set_difficulty(difficulty);
            draft.set_notes(notes);
            for (drill_id, name, value) in metrics {
                draft.set_metric(drill_id, &name, value);
            }
            let payload = draft.into_payload(&routine)?;

            match rt.block_on(api.submit_log(&payload)) {
                Ok(()) => println!("session logged"),
                Err(ApiError::Validation(fields)) => {
                    return Err(
                        format!("session log rejected:\n{}", format_field_errors(&fields)).into(),
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

fn parse_metric(s: &str) -> Result<(u64, String, String), String> {
    let (drill, rest) = s
        .split_once(':')
        .ok_or_else(|| format!("expected DRILL_ID:METRIC=VALUE, got '{s}'"))?;
    let (name, value) = rest
        .split_once('=')
        .ok_or_else(|| format!("expected DRILL_ID:METRIC=VALUE, got '{s}'"))?;
    let drill_id = drill
        .trim()
        .parse()
        .map_err(|_| format!("invalid drill id '{drill}'"))?;
    if name.trim().is_empty() {
        return Err("metric name is empty".to_string());
    }
    Ok((drill_id, name.trim().to_string(), value.to_string()))
}
