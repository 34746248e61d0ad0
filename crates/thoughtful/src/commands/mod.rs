//! CLI command handlers.

pub mod config;
pub mod run;
pub mod split;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Verbose output enabled.
    pub verbose: bool,
}
