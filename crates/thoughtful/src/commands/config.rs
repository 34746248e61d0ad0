//! Config command - show the resolved configuration.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config file layered on top of the discovered ones
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let loaded = thoughtful_config::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for path in sources {
            println!("# Loaded: {}", path.display());
        }
    }
    if ctx.verbose {
        for source in loaded.sources.iter().filter(|s| !s.loaded) {
            println!("# Not found: {}", source.path.display());
        }
    }
    for warning in &loaded.warnings {
        println!("# Warning: {warning}");
    }
    if let Err(e) = loaded.config.validate() {
        println!("# Warning: {e}");
    }
    println!();

    print!("{}", resolved(&loaded.config).to_toml()?);
    Ok(())
}

/// Every section filled in with its effective values.
fn resolved(config: &thoughtful_config::ThoughtfulConfig) -> thoughtful_config::ThoughtfulConfig {
    thoughtful_config::ThoughtfulConfig {
        llm: Some(config.llm()),
        embedding: Some(config.embedding()),
        memory: Some(config.memory()),
        thoughts: Some(config.thoughts()),
        engagement: Some(config.engagement()),
        conversation: Some(config.conversation()),
        agents: config.agents.clone(),
        humans: config.humans.clone(),
    }
}
