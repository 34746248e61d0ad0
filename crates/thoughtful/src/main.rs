//! thoughtful - simulated conversations between proactive agents.
//!
//! Main entry point for the thoughtful CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod rehearsal;
mod setup;

use commands::{config, run, split};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// thoughtful - agents that think before, during and after their turn
#[derive(Parser)]
#[command(name = "thoughtful")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a simulated conversation
    Run(run::RunArgs),

    /// Print the resolved configuration
    Config(config::ConfigArgs),

    /// Split text into persona memory chunks
    Split(split::SplitArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let default_filter = if cli.verbose {
        "thoughtful=debug,thoughtful_agent=debug,thoughtful_memory=debug,thoughtful_llm=debug,thoughtful_config=debug,info"
    } else {
        "thoughtful=info,thoughtful_agent=info,thoughtful_llm=info,warn"
    };
    let console_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let log_dir = thoughtful_config::log_dir().unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "thoughtful.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "thoughtful=trace,thoughtful_agent=trace,thoughtful_memory=trace,thoughtful_llm=trace,thoughtful_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx),
        Commands::Split(args) => split::run(args),
    }
}
