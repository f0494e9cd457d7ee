use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod data;
mod report;

#[derive(Parser)]
#[command(name = "albl", about = "Pool-based active learning by learning")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the adaptive strategy against known ground truth
    Simulate(commands::simulate::SimulateArgs),
    /// Label a dataset interactively
    Label(commands::label::LabelArgs),
    /// Show which optional native strategies are available
    Features(commands::features::FeaturesArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args).await,
        Commands::Label(args) => commands::label::run(args).await,
        Commands::Features(args) => commands::features::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
