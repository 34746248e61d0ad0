//! Error types for the memory crate.

use thiserror::Error;
use thoughtful_llm::ServiceError;

use crate::validation::ValidationError;

/// Errors that can occur in the memory crate.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Input rejected before anything was stored.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The embedding service failed; nothing was stored.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Requested memory not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl MemoryError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;
