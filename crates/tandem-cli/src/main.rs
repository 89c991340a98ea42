//! Tandem CLI - render processing graphs and manage session files.

mod commands;
mod config;
mod wav;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(author, version, about = "Tandem processing graph CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a graph described in TOML to a WAV file
    Render(commands::render::RenderArgs),

    /// Inspect, create and convert session files
    Session(commands::session::SessionArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Session(args) => commands::session::run(args),
    }
}
