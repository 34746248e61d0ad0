//! Error types for the agent crate.

use thiserror::Error;
use thoughtful_llm::ServiceError;
use thoughtful_memory::MemoryError;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent and conversation operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Input rejected at an API boundary; nothing was changed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Embedding or completion backend failure.
    #[error(transparent)]
    Service(ServiceError),

    /// Memory store error that is neither validation nor service related.
    #[error("Memory error: {0}")]
    Memory(MemoryError),

    /// The turn was cancelled before this pipeline finished.
    #[error("Turn cancelled")]
    Cancelled,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ServiceError> for AgentError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

// Flatten memory errors so callers can match on the category directly.
impl From<MemoryError> for AgentError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Validation(e) => Self::Validation(e.to_string()),
            MemoryError::Service(e) => Self::Service(e),
            other => Self::Memory(other),
        }
    }
}
