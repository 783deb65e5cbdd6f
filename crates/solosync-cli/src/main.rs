use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "solosync", version, about = "SoloSync routine player")]
struct Cli {
    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in or out of the SoloSync API
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Assigned routines
    Routine {
        #[command(subcommand)]
        action: commands::routine::RoutineAction,
    },
    /// Guided session playback
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Session logs
    Log {
        #[command(subcommand)]
        action: commands::log::LogAction,
    },
    /// Completed sessions, calendar and streaks
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    if cli.verbose {
        solosync_core::logging::init_with_level("debug");
    } else {
        solosync_core::logging::init();
    }

    let result = match cli.command {
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Routine { action } => commands::routine::run(action),
        Commands::Session { action } => commands::session::run(action),
        Commands::Log { action } => commands::log::run(action),
        Commands::History { action } => commands::history::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
