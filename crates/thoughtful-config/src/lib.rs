//! Configuration for thoughtful.
//!
//! Provides TOML-based configuration with:
//! - Service sections (`[llm]`, `[embedding]`)
//! - Engine tuning (`[memory]`, `[thoughts]`, `[engagement]`, `[conversation]`)
//! - Participant rosters (`[[agents]]`, `[[humans]]`)
//! - Config file layering (user config, project-local file, explicit path)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, data_dir, load_config, load_config_file, load_config_with_options, log_dir,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
