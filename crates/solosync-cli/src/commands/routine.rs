use clap::Subcommand;
use solosync_core::{Config, Routine};

#[derive(Subcommand)]
pub enum RoutineAction {
    /// List routines assigned to you
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the steps of one routine
    Show {
        /// Routine ID
        id: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: RoutineAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let api = super::api_client(&config)?;
    let rt = super::runtime()?;

    match action {
        RoutineAction::List { json } => {
            let routines = rt.block_on(api.list_routines())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&routines)?);
            } else if routines.is_empty() {
                println!("no routines assigned");
            } else {
                for r in &routines {
                    println!(
                        "{:>5}  {:<32}  {:<12}  {}",
                        r.id,
                        r.name,
                        r.difficulty_display.as_deref().unwrap_or("-"),
                        r.total_duration_display.as_deref().unwrap_or("")
                    );
                }
            }
        }
        RoutineAction::Show { id, json } => {
            let routine = rt.block_on(api.fetch_routine(id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&routine)?);
            } else {
                print_routine(&routine);
            }
        }
    }
    Ok(())
}

fn print_routine(routine: &Routine) {
    println!("{} (#{})", routine.name, routine.id);
    if let Some(description) = routine.description.as_deref().filter(|d| !d.is_empty()) {
        println!("{description}");
    }
    if let Some(difficulty) = &routine.difficulty_display {
        println!("Difficulty: {difficulty}");
    }
    println!("Total: {}", routine.total_display());
    println!();
    for (i, step) in routine.steps().iter().enumerate() {
        let rest = step
            .rest_secs()
            .map(|secs| format!(", rest {secs}s"))
            .unwrap_or_default();
        println!(
            "{:>2}. {} ({}{rest})",
            i + 1,
            step.drill_name,
            step.target_display()
        );
        if let Some(notes) = step.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            println!("    {notes}");
        }
        if !step.metrics_to_collect.is_empty() {
            println!("    logs: {}", step.metrics_to_collect.join(", "));
        }
    }
}
