use anyhow::Result;
use clap::{Parser, Subcommand};

use simrelay::cli::clean::CleanCommand;
use simrelay::cli::config::ConfigCommand;
use simrelay::cli::metrics::MetricsCommand;
use simrelay::cli::snapshot::SnapshotCommand;
use simrelay::cli::submit::SubmitCommand;

#[derive(Parser)]
#[command(name = "simrelay")]
#[command(about = "Submit compute workloads to a remote core-simulation service and retrieve results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Submit(SubmitCommand),
    Metrics(MetricsCommand),
    Clean(CleanCommand),
    Snapshot(SnapshotCommand),
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // Initialize logging with INFO level by default
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Submit(cmd) => cmd.execute(),
        Commands::Metrics(cmd) => cmd.execute(),
        Commands::Clean(cmd) => cmd.execute(),
        Commands::Snapshot(cmd) => cmd.execute(),
        Commands::Config(cmd) => cmd.execute(),
    }
}
