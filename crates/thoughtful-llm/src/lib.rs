//! Service boundary for thoughtful agents.
//!
//! Two external services sit underneath the cognitive engine:
//!
//! ```text
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │  Embedder                │   │  LlmBackend              │
//! │  - embed(text) -> Vec    │   │  - complete(req) -> resp │
//! └──────────────────────────┘   └──────────────────────────┘
//!        │            │                 │            │
//!        ▼            ▼                 ▼            ▼
//!   MockEmbedder  OpenAiEmbedder   MockBackend  OpenAiBackend
//! ```
//!
//! Backends retry transient failures internally. Anything that still fails
//! surfaces to callers as a [`ServiceError`], which is never retried above
//! this crate.

pub mod backend;
pub mod embeddings;
pub mod error;
pub mod types;

// Provider implementations
pub mod openai;

pub use backend::{LlmBackend, MockBackend, SharedBackend, with_retry};
pub use error::{LlmError, RateLimitInfo, Result, ServiceError};
pub use types::{CompletionRequest, CompletionResponse, StopReason, Usage};

pub use embeddings::{
    Embedder, EmbedderSpec, MockEmbedder, MockMode, OpenAiEmbedder, OpenAiEmbedderConfig,
    SharedEmbedder, build_embedder, cosine_similarity,
};

pub use openai::{DEFAULT_CHAT_MODEL, OpenAiBackend, OpenAiConfig};
