use clap::{Parser, Subcommand};

mod app;
mod commands;

#[derive(Parser)]
#[command(name = "snoozeai", version, about = "SnoozeAI CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize, classify and snooze an incoming notification
    Ingest(commands::ingest::IngestArgs),
    /// Manual snooze management
    Snooze {
        #[command(subcommand)]
        action: commands::snooze::SnoozeAction,
    },
    /// Reconcile the local store with the backend
    Sync {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fire due resurface tasks
    Worker(commands::worker::WorkerArgs),
    /// Quiet hours, default snooze duration and classifier hints
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Check backend health
    Health,
    /// Show where quiet hours would move a resurfacing time
    Preview(commands::preview::PreviewArgs),
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Ingest(args) => commands::ingest::run(args).await,
        Commands::Snooze { action } => commands::snooze::run(action).await,
        Commands::Sync { json } => commands::sync::run(json).await,
        Commands::Worker(args) => commands::worker::run(args).await,
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Health => commands::health::run().await,
        Commands::Preview(args) => commands::preview::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
