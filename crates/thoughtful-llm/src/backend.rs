//! Completion backend trait and implementations.
//!
//! [`LlmBackend`] is the completion service boundary. [`MockBackend`] is the
//! scriptable stand-in used throughout the test suites.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse, StopReason, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures, rate limits). A
/// provider-supplied `retry_after` takes precedence over the backoff.
/// Non-retryable errors are returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !err.is_retryable() || attempt >= max_retries {
            return Err(err);
        }
        attempt += 1;

        let wait = err.retry_after().unwrap_or(backoff);
        tracing::warn!(
            backend = backend_name,
            attempt,
            max_retries,
            backoff_ms = wait.as_millis() as u64,
            error = %err,
            "Request failed, retrying"
        );
        tokio::time::sleep(wait).await;
        backoff *= 2;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for completion providers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Execute a completion request and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Check if the backend is available and properly configured.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A backend that can be shared across tasks.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

type Responder = Arc<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(String),
}

/// A mock backend for testing.
///
/// Scripted replies are consumed in order first. Once the script is empty the
/// responder (if any) answers; otherwise the request fails. An optional
/// latency is applied before every reply, which makes the mock useful for
/// exercising timeouts and cancellation.
pub struct MockBackend {
    name: String,
    script: Mutex<VecDeque<MockReply>>,
    responder: Option<Responder>,
    latency: Option<Duration>,
    request_log: Mutex<Vec<CompletionRequest>>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("name", &self.name)
            .field("scripted", &self.script.lock().len())
            .field("has_responder", &self.responder.is_some())
            .field("latency", &self.latency)
            .finish()
    }
}

impl MockBackend {
    /// Create a mock backend with the given text replies, returned in order.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "mock".to_string(),
            script: Mutex::new(
                replies
                    .into_iter()
                    .map(|s| MockReply::Text(s.into()))
                    .collect(),
            ),
            responder: None,
            latency: None,
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend with a single text reply.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new([text.into()])
    }

    /// Create a mock backend that answers every request with `f(request)`.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&CompletionRequest) -> String + Send + Sync + 'static,
    {
        let mut backend = Self::new(Vec::<String>::new());
        backend.responder = Some(Arc::new(move |req| Ok(f(req))));
        backend
    }

    /// Create a mock backend whose every request fails with a backend error.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut backend = Self::new(Vec::<String>::new());
        backend.responder = Some(Arc::new(move |_| Err(LlmError::Backend(message.clone()))));
        backend
    }

    /// Queue a failure after the currently scripted replies.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.script.lock().push_back(MockReply::Fail(message.into()));
        self
    }

    /// Queue another text reply after the currently scripted replies.
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(MockReply::Text(text.into()));
        self
    }

    /// Delay every reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }

    fn next_reply(&self, request: &CompletionRequest) -> Result<String> {
        if let Some(reply) = self.script.lock().pop_front() {
            return match reply {
                MockReply::Text(text) => Ok(text),
                MockReply::Fail(message) => Err(LlmError::Backend(message)),
            };
        }
        match &self.responder {
            Some(responder) => responder(request),
            None => Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            )),
        }
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.request_log.lock().push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let text = self.next_reply(&request)?;
        let n = self.request_count();
        Ok(CompletionResponse::new(
            format!("mock_msg_{}", n),
            "mock-model",
            text,
            StopReason::EndTurn,
            Usage::new(request.prompt.len() as u32 / 4, 20),
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
