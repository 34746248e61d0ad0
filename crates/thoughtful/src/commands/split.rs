//! Split command - preview how a persona becomes memories.

use anyhow::{Result, bail};
use clap::Args;
use console::Style;
use thoughtful_memory::TextSplitter;

/// Arguments for the split command.
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Text to split (e.g. a persona)
    #[arg(required = true)]
    pub text: String,
}

/// Run the split command.
pub fn run(args: SplitArgs) -> Result<()> {
    let chunks = TextSplitter::new().split(&args.text);
    if chunks.is_empty() {
        bail!("Text produced no chunks");
    }

    let dim = Style::new().dim();
    for (i, chunk) in chunks.iter().enumerate() {
        println!("{} {}", dim.apply_to(format!("{:>3}.", i + 1)), chunk);
    }
    Ok(())
}
