//! Validation for memory inputs.
//!
//! Everything here runs before a store is touched, so a rejected input
//! never leaves partial state behind.

use crate::error::{MemoryError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Validation Error
// ─────────────────────────────────────────────────────────────────────────────

/// Specific validation error types for memory data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Memory text is empty or whitespace.
    #[error("Empty text provided for memory")]
    EmptyContent,

    /// Memory text contains a NUL byte.
    #[error("memory content contains a NUL byte")]
    InvalidContent,

    /// Weight is negative, NaN or infinite.
    #[error("memory weight {0} must be finite and non-negative")]
    InvalidWeight(f32),

    /// The embedding service returned an empty vector.
    #[error("embedding is empty")]
    EmptyEmbedding,

    /// Embedding dimension mismatch.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding contains invalid values (NaN or Inf).
    #[error("embedding contains {count} invalid values (NaN or Inf)")]
    InvalidEmbeddingValues { count: usize },

    /// A tuning parameter is outside its allowed range.
    #[error("invalid {name}: {value} ({constraint})")]
    InvalidParameter {
        name: &'static str,
        value: f32,
        constraint: &'static str,
    },
}

impl ValidationError {
    pub fn parameter(name: &'static str, value: f32, constraint: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            constraint,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content & Weight
// ─────────────────────────────────────────────────────────────────────────────

/// Validate memory text: non-blank, no NUL bytes.
pub fn validate_memory_content(content: &str) -> std::result::Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    if content.contains('\0') {
        return Err(ValidationError::InvalidContent);
    }
    Ok(())
}

/// Validate a caller-assigned importance weight.
pub fn validate_weight(weight: f32) -> std::result::Result<(), ValidationError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(ValidationError::InvalidWeight(weight));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Validate an embedding vector.
///
/// `expected_dim` is `None` until the first item establishes the store's
/// dimensionality.
pub fn validate_embedding(
    embedding: &[f32],
    expected_dim: Option<usize>,
) -> std::result::Result<(), ValidationError> {
    if embedding.is_empty() {
        return Err(ValidationError::EmptyEmbedding);
    }

    if let Some(expected) = expected_dim
        && embedding.len() != expected
    {
        return Err(ValidationError::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }

    let invalid_count = embedding.iter().filter(|v| !v.is_finite()).count();
    if invalid_count > 0 {
        return Err(ValidationError::InvalidEmbeddingValues {
            count: invalid_count,
        });
    }

    Ok(())
}

/// Validate a unit-interval parameter.
pub fn validate_unit(name: &'static str, value: f32) -> std::result::Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::parameter(name, value, "must be in [0, 1]"));
    }
    Ok(())
}

/// Validate text and weight together, converting to [`MemoryError`].
pub fn validate_input(content: &str, weight: f32) -> Result<()> {
    validate_memory_content(content)?;
    validate_weight(weight).map_err(MemoryError::from)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
