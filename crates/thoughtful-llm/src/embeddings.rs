//! Embedding service.
//!
//! This module provides the [`Embedder`] trait and implementations for
//! generating vector embeddings from text. Memories, thoughts and utterances
//! are all embedded once, at creation, and compared with
//! [`cosine_similarity`].
//!
//! # Implementations
//!
//! - [`MockEmbedder`]: Deterministic embeddings for tests and offline runs
//! - [`OpenAiEmbedder`]: OpenAI-compatible `/embeddings` API

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::with_retry;
use crate::error::{LlmError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for generating text embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts in a batch.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Get the dimensionality of embeddings produced by this embedder.
    fn dimensions(&self) -> usize;

    /// Get the name of this embedder.
    fn name(&self) -> &str;
}

/// A shared embedder that can be used across tasks.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// How a [`MockEmbedder`] turns text into a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    /// Pseudo-random vector seeded by a hash of the whole text. Different
    /// texts are close to orthogonal.
    #[default]
    Hash,
    /// Bag of hashed words. Texts sharing words have positive similarity,
    /// which gives meaningful retrieval in offline runs.
    Lexical,
}

/// A deterministic embedder.
///
/// The same text always produces the same unit-length vector.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
    mode: MockMode,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            mode: MockMode::Hash,
        }
    }

    /// A word-overlap embedder with the given dimensions.
    pub fn lexical(dimensions: usize) -> Self {
        Self {
            dimensions,
            mode: MockMode::Lexical,
        }
    }

    /// Create a mock embedder with 384 dimensions.
    pub fn default_dimensions() -> Self {
        Self::new(384)
    }

    pub fn mode(&self) -> MockMode {
        self.mode
    }

    fn hashed(&self, text: &str) -> Vec<f32> {
        let mut state = simple_hash(text);
        (0..self.dimensions)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                ((state >> 16) & 0x7fff) as f32 / 16384.0 - 1.0
            })
            .collect()
    }

    fn bag_of_words(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase);
        let mut any = false;
        for word in words {
            let bucket = (simple_hash(&word) % self.dimensions as u64) as usize;
            embedding[bucket] += 1.0;
            any = true;
        }
        if any { embedding } else { self.hashed(text) }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::default_dimensions()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(LlmError::Config(
                "MockEmbedder requires at least one dimension".to_string(),
            ));
        }
        let mut embedding = match self.mode {
            MockMode::Hash => self.hashed(text),
            MockMode::Lexical => self.bag_of_words(text),
        };
        normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// djb2; stable across runs and platforms.
fn simple_hash(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for OpenAI embeddings.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Model to use for embeddings.
    pub model: String,
    /// Requested output dimensions (text-embedding-3 models only).
    pub dimensions: Option<usize>,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retries for transient failures.
    pub max_retries: u32,
}

impl OpenAiEmbedderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    /// Create config from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LlmError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// OpenAI embeddings API client.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let dimensions = config.dimensions.unwrap_or(match config.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        });

        Ok(Self {
            client,
            config,
            dimensions,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiEmbedderConfig::from_env()?)
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }

    async fn send(&self, request: &EmbeddingRequest) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LlmError::Auth(body),
                429 => LlmError::RateLimit(crate::error::RateLimitInfo::parse_openai(
                    &body,
                    retry_after.as_deref(),
                )),
                500..=599 => LlmError::Network(format!("HTTP {}: {}", status, body)),
                _ => LlmError::Backend(format!(
                    "Embedding request failed: HTTP {} - {}",
                    status, body
                )),
            });
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(format!("Failed to parse response: {}", e)))?;

        let mut data = result.data;
        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Internal("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: self.config.model.clone(),
            input: texts.iter().map(|s| s.to_string()).collect(),
            dimensions: self.config.dimensions,
        };

        let embeddings = with_retry(
            self.config.max_retries,
            Duration::from_millis(500),
            "openai-embeddings",
            || self.send(&request),
        )
        .await?;

        if embeddings.len() != texts.len() {
            return Err(LlmError::Backend(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, serde::Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Everything needed to construct an embedder.
#[derive(Debug, Clone, Default)]
pub struct EmbedderSpec {
    /// "openai", "mock" or "mock-lexical".
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub dimensions: Option<usize>,
    pub max_retries: Option<u32>,
}

/// Build a `SharedEmbedder` from a spec.
pub fn build_embedder(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    match spec.provider.as_str() {
        "openai" => {
            let api_key = spec.openai_api_key.as_deref().ok_or_else(|| {
                LlmError::Config(
                    "OpenAI embedding provider requires an API key. \
                     Set OPENAI_API_KEY or configure [embedding] api_key_env."
                        .to_string(),
                )
            })?;
            let mut config = OpenAiEmbedderConfig::new(api_key);
            if let Some(ref model) = spec.openai_model {
                config = config.with_model(model);
            }
            if let Some(ref base_url) = spec.openai_base_url {
                config = config.with_base_url(base_url);
            }
            if let Some(dims) = spec.dimensions {
                config = config.with_dimensions(dims);
            }
            if let Some(retries) = spec.max_retries {
                config = config.with_max_retries(retries);
            }
            Ok(Arc::new(OpenAiEmbedder::new(config)?))
        }
        "mock" => Ok(Arc::new(MockEmbedder::new(spec.dimensions.unwrap_or(384)))),
        "mock-lexical" => Ok(Arc::new(MockEmbedder::lexical(
            spec.dimensions.unwrap_or(256),
        ))),
        other => Err(LlmError::Config(format!(
            "Unknown embedding provider '{}'. Valid: openai, mock, mock-lexical",
            other
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Utility Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Calculate cosine similarity between two embeddings.
///
/// Returns 0.0 for mismatched lengths, empty vectors or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedder() {
        let embedder = MockEmbedder::default();
        assert_eq!(embedder.dimensions(), 384);
        assert_eq!(embedder.name(), "mock");

        let embedding = embedder.embed("hello world").await.unwrap();
        assert_eq!(embedding.len(), 384);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_mock_embedder_deterministic() {
        let embedder = MockEmbedder::default();
        let e1 = embedder.embed("test text").await.unwrap();
        let e2 = embedder.embed("test text").await.unwrap();
        assert_eq!(e1, e2);
    }

    #[tokio::test]
    async fn test_mock_embedder_different_texts() {
        let embedder = MockEmbedder::default();
        let e1 = embedder.embed("hello").await.unwrap();
        let e2 = embedder.embed("world").await.unwrap();
        assert_ne!(e1, e2);
    }

    #[tokio::test]
    async fn test_mock_embedder_zero_dimensions_fails() {
        let embedder = MockEmbedder::new(0);
        assert!(matches!(
            embedder.embed("x").await,
            Err(LlmError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_lexical_embedder_rewards_overlap() {
        let embedder = MockEmbedder::lexical(128);
        let query = embedder.embed("I love hiking in the mountains").await.unwrap();
        let close = embedder.embed("Mountains are great for hiking").await.unwrap();
        let far = embedder.embed("Quarterly tax filings").await.unwrap();

        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[tokio::test]
    async fn test_lexical_embedder_case_insensitive() {
        let embedder = MockEmbedder::lexical(64);
        let a = embedder.embed("Hello World").await.unwrap();
        let b = embedder.embed("hello, world!").await.unwrap();
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_embed_batch() {
        let embedder = MockEmbedder::default();
        let embeddings = embedder.embed_batch(&["one", "two", "three"]).await.unwrap();

        assert_eq!(embeddings.len(), 3);
        for emb in &embeddings {
            assert_eq!(emb.len(), 384);
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_openai_embedder_config_builder() {
        let config = OpenAiEmbedderConfig::new("key")
            .with_base_url("http://custom.api")
            .with_model("text-embedding-3-large")
            .with_max_retries(1);

        assert_eq!(config.api_key, "key");
        assert_eq!(config.base_url, "http://custom.api");
        assert_eq!(config.model, "text-embedding-3-large");
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn test_openai_embedder_dimensions_follow_model() {
        let large =
            OpenAiEmbedder::new(OpenAiEmbedderConfig::new("k").with_model("text-embedding-3-large"))
                .unwrap();
        assert_eq!(large.dimensions(), 3072);

        let custom =
            OpenAiEmbedder::new(OpenAiEmbedderConfig::new("k").with_dimensions(256)).unwrap();
        assert_eq!(custom.dimensions(), 256);
    }

    #[test]
    fn test_build_embedder_mock() {
        let spec = EmbedderSpec {
            provider: "mock".to_string(),
            dimensions: Some(32),
            ..Default::default()
        };
        let embedder = build_embedder(&spec).unwrap();
        assert_eq!(embedder.dimensions(), 32);
        assert_eq!(embedder.name(), "mock");
    }

    #[test]
    fn test_build_embedder_openai_requires_key() {
        let spec = EmbedderSpec {
            provider: "openai".to_string(),
            ..Default::default()
        };
        assert!(matches!(build_embedder(&spec), Err(LlmError::Config(_))));
    }

    #[test]
    fn test_build_embedder_unknown_provider() {
        let spec = EmbedderSpec {
            provider: "nope".to_string(),
            ..Default::default()
        };
        let err = build_embedder(&spec).err().unwrap();
        assert!(err.to_string().contains("nope"));
    }
}
