//! Vocora CLI - sing through the vocoder, live or from a file.

mod commands;
mod console;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vocora")]
#[command(author, version, about = "Real-time voice vocoder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the vocoder on live audio with an interactive console
    Run(commands::run::RunArgs),

    /// Render a WAV file through the vocoder
    Process(commands::process::ProcessArgs),

    /// Show the pitch layout for a sample rate
    Info(commands::info::InfoArgs),

    /// List audio devices
    Devices(commands::devices::DevicesArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Process(args) => commands::process::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Devices(args) => commands::devices::run(args),
    }
}
