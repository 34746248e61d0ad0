//! Test embedders.

use std::collections::HashMap;

use async_trait::async_trait;
use thoughtful_llm::{Embedder, LlmError};

/// Returns fixed vectors for known texts, a constant vector otherwise.
pub(crate) struct KeyedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl KeyedEmbedder {
    pub(crate) fn new(dimensions: usize) -> Self {
        let mut fallback = vec![0.0; dimensions];
        if let Some(last) = fallback.last_mut() {
            *last = 1.0;
        }
        Self {
            vectors: HashMap::new(),
            fallback,
        }
    }

    pub(crate) fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl Embedder for KeyedEmbedder {
    async fn embed(&self, text: &str) -> thoughtful_llm::Result<Vec<f32>> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    fn dimensions(&self) -> usize {
        self.fallback.len()
    }

    fn name(&self) -> &str {
        "keyed"
    }
}

/// Always fails.
pub(crate) struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> thoughtful_llm::Result<Vec<f32>> {
        Err(LlmError::Network("connection refused".to_string()))
    }

    fn dimensions(&self) -> usize {
        4
    }

    fn name(&self) -> &str {
        "failing"
    }
}
