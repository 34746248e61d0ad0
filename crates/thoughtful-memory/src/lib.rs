//! Per-agent memory for thoughtful agents.
//!
//! Each agent owns one [`MemoryStore`] holding two tiers:
//!
//! - **Long-term**: persona facts seeded at agent creation. Never pruned.
//! - **Working**: memories derived from the live conversation. Pruned once
//!   their saliency falls under a floor or they go unused for too long.
//!
//! Retrieval ranks every item by a composite score (see [`SaliencyConfig`])
//! and refreshes the items it returns while decaying the rest.
//!
//! ```no_run
//! use thoughtful_llm::MockEmbedder;
//! use thoughtful_memory::{MemoryStore, MemoryType, SaliencyConfig};
//! use thoughtful_types::RandomIds;
//! use std::sync::Arc;
//!
//! # async fn demo() -> thoughtful_memory::Result<()> {
//! let mut store = MemoryStore::new(
//!     Arc::new(MockEmbedder::new(64)),
//!     RandomIds::shared(),
//!     SaliencyConfig::default(),
//! );
//! store.add("agent-1", "I grew up by the sea.", 1.0, MemoryType::LongTerm, 0).await?;
//! let query = store.long_term()[0].embedding().to_vec();
//! let top = store.retrieve(&query, 1, 3);
//! # let _ = top;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod splitter;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use config::SaliencyConfig;
pub use error::{MemoryError, Result};
pub use splitter::TextSplitter;
pub use store::MemoryStore;
pub use types::{MemoryItem, MemoryType, RecallMatch};
pub use validation::{
    ValidationError, validate_embedding, validate_input, validate_memory_content, validate_unit,
    validate_weight,
};
