//! Retrieval and decay tuning.
//!
//! The composite retrieval score is
//!
//! ```text
//! score = α·cos(item, query) + β·weight + γ·recency_decay^(turn − last_accessed) + δ·ln(1 + retrievals)
//! ```
//!
//! with α, β, γ, δ = `relevance_weight`, `importance_weight`,
//! `recency_weight`, `frequency_weight`.

use serde::{Deserialize, Serialize};

use crate::validation::{ValidationError, validate_unit};

/// Tunables for [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaliencyConfig {
    /// α: weight of semantic similarity.
    pub relevance_weight: f32,
    /// β: weight of caller-assigned importance.
    pub importance_weight: f32,
    /// γ: weight of recency.
    pub recency_weight: f32,
    /// δ: weight of retrieval frequency.
    pub frequency_weight: f32,
    /// Per-turn base of the recency term, in (0, 1].
    pub recency_decay: f32,
    /// Per-turn saliency multiplier for items not retrieved, in (0, 1).
    pub decay_factor: f32,
    /// Fraction of the gap to 1.0 restored on retrieval, in (0, 1].
    pub refresh_rate: f32,
    /// Working items below this saliency are pruned.
    pub prune_floor: f32,
    /// Working items not accessed for more than this many turns are pruned.
    pub working_window: Option<u64>,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            relevance_weight: 1.0,
            importance_weight: 0.5,
            recency_weight: 0.5,
            frequency_weight: 0.1,
            recency_decay: 0.99,
            decay_factor: 0.9,
            refresh_rate: 0.5,
            prune_floor: 0.05,
            working_window: Some(50),
        }
    }
}

impl SaliencyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set α, β, γ, δ in one go.
    pub fn with_weights(mut self, relevance: f32, importance: f32, recency: f32, frequency: f32) -> Self {
        self.relevance_weight = relevance;
        self.importance_weight = importance;
        self.recency_weight = recency;
        self.frequency_weight = frequency;
        self
    }

    pub fn with_decay_factor(mut self, factor: f32) -> Self {
        self.decay_factor = factor;
        self
    }

    pub fn with_refresh_rate(mut self, rate: f32) -> Self {
        self.refresh_rate = rate;
        self
    }

    pub fn with_prune_floor(mut self, floor: f32) -> Self {
        self.prune_floor = floor;
        self
    }

    pub fn with_working_window(mut self, window: Option<u64>) -> Self {
        self.working_window = window;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("relevance_weight", self.relevance_weight),
            ("importance_weight", self.importance_weight),
            ("recency_weight", self.recency_weight),
            ("frequency_weight", self.frequency_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::parameter(
                    name,
                    value,
                    "must be finite and non-negative",
                ));
            }
        }
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(ValidationError::parameter(
                "decay_factor",
                self.decay_factor,
                "must be in (0, 1)",
            ));
        }
        if !(self.recency_decay > 0.0 && self.recency_decay <= 1.0) {
            return Err(ValidationError::parameter(
                "recency_decay",
                self.recency_decay,
                "must be in (0, 1]",
            ));
        }
        if !(self.refresh_rate > 0.0 && self.refresh_rate <= 1.0) {
            return Err(ValidationError::parameter(
                "refresh_rate",
                self.refresh_rate,
                "must be in (0, 1]",
            ));
        }
        validate_unit("prune_floor", self.prune_floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SaliencyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_decay_factor_must_be_below_one() {
        let config = SaliencyConfig::new().with_decay_factor(1.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("decay_factor"));

        assert!(SaliencyConfig::new().with_decay_factor(0.0).validate().is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let config = SaliencyConfig::new().with_weights(1.0, -0.5, 0.5, 0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_rate_bounds() {
        assert!(SaliencyConfig::new().with_refresh_rate(1.0).validate().is_ok());
        assert!(SaliencyConfig::new().with_refresh_rate(0.0).validate().is_err());
    }

    #[test]
    fn test_serde_fills_defaults() {
        let config: SaliencyConfig = serde_json::from_str(r#"{"decay_factor": 0.5}"#).unwrap();
        assert_eq!(config.decay_factor, 0.5);
        assert_eq!(config.relevance_weight, 1.0);
        assert_eq!(config.working_window, Some(50));
    }
}
