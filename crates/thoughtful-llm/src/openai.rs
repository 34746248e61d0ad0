//! OpenAI-compatible completion backend.
//!
//! Connects to OpenAI's chat completions API or any compatible service
//! (Groq, Ollama, local servers).

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{LlmBackend, SharedBackend, with_retry};
use crate::error::{LlmError, RateLimitInfo, Result};
use crate::types::{CompletionRequest, CompletionResponse, StopReason, Usage};

/// Default OpenAI API base URL.
const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

/// Model used when neither the config nor the request names one.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication (optional for local services like Ollama).
    pub api_key: Option<String>,

    /// Base URL for the API.
    pub base_url: String,

    /// Model to use. Takes precedence over the request's model.
    pub model: Option<String>,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum retries for transient errors.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,

    /// Name for this backend instance.
    pub name: String,
}

impl OpenAiConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: DEFAULT_OPENAI_BASE.to_string(),
            model: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            name: "openai".to_string(),
        }
    }

    /// Local Ollama instance; no API key.
    pub fn ollama() -> Self {
        Self {
            api_key: None,
            base_url: "http://localhost:11434/v1".to_string(),
            model: None,
            timeout: Duration::from_secs(600),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            name: "ollama".to_string(),
        }
    }

    /// Create config for OpenAI from the named environment variable.
    pub fn from_env_var(var: &str) -> Result<Self> {
        let api_key = std::env::var(var)
            .map_err(|_| LlmError::Config(format!("{} environment variable not set", var)))?;
        Ok(Self::openai(api_key))
    }

    pub fn openai_from_env() -> Result<Self> {
        Self::from_env_var("OPENAI_API_KEY")
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Backend
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible API backend.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn openai_from_env() -> Result<Self> {
        Self::new(OpenAiConfig::openai_from_env()?)
    }

    /// Wrap in an `Arc` for sharing between agents.
    pub fn shared(config: OpenAiConfig) -> Result<SharedBackend> {
        Ok(Arc::new(Self::new(config)?))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(header::CONTENT_TYPE, "application/json");

        if let Some(ref api_key) = self.config.api_key {
            builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key))
        } else {
            builder
        }
    }

    fn to_openai_request(&self, request: &CompletionRequest) -> OpenAiChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let model = self
            .config
            .model
            .clone()
            .or_else(|| (!request.model.is_empty()).then(|| request.model.clone()))
            .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());

        OpenAiChatRequest {
            model,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            stop: (!request.stop_sequences.is_empty()).then(|| request.stop_sequences.clone()),
        }
    }

    async fn handle_response(response: Response) -> Result<CompletionResponse> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: OpenAiChatResponse = serde_json::from_str(&body)?;
        Ok(parsed.into())
    }

    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<OpenAiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        match status.as_u16() {
            401 | 403 => LlmError::Auth(format!("Authentication failed: {}", message)),
            429 => LlmError::RateLimit(RateLimitInfo::parse_openai(
                &message,
                retry_after.as_deref(),
            )),
            500..=599 => LlmError::Network(format!("Server error: {}", message)),
            400..=499 => LlmError::InvalidRequest(message),
            _ => LlmError::Backend(message),
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let openai_request = self.to_openai_request(&request);

        tracing::debug!(
            backend = %self.config.name,
            model = %openai_request.model,
            prompt_chars = request.prompt.len(),
            "Sending OpenAI-compatible request"
        );

        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            &self.config.name,
            || async {
                let response = self
                    .add_headers(self.client.post(self.completions_url()))
                    .json(&openai_request)
                    .send()
                    .await?;

                Self::handle_response(response).await
            },
        )
        .await
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn health_check(&self) -> Result<()> {
        let request = CompletionRequest::new("ping").with_max_tokens(1);
        match self.complete(request).await {
            Ok(_) => Ok(()),
            // Rate limited means reachable
            Err(LlmError::RateLimit(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI API Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, serde::Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiChatResponse {
    id: String,
    choices: Vec<OpenAiChoice>,
    model: String,
    usage: Option<OpenAiUsage>,
}

impl From<OpenAiChatResponse> for CompletionResponse {
    fn from(resp: OpenAiChatResponse) -> Self {
        let (text, stop_reason) = match resp.choices.into_iter().next() {
            Some(choice) => (
                choice.message.content.unwrap_or_default(),
                choice
                    .finish_reason
                    .as_deref()
                    .map(StopReason::from_finish_reason)
                    .unwrap_or(StopReason::EndTurn),
            ),
            None => (String::new(), StopReason::EndTurn),
        };

        let usage = resp
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        CompletionResponse::new(resp.id, resp.model, text, stop_reason, usage)
    }
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, serde::Deserialize)]
struct OpenAiError {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_config() {
        let config = OpenAiConfig::openai("test-key");
        assert_eq!(config.api_key, Some("test-key".to_string()));
        assert_eq!(config.base_url, DEFAULT_OPENAI_BASE);
        assert_eq!(config.name, "openai");
    }

    #[test]
    fn test_ollama_config() {
        let config = OpenAiConfig::ollama();
        assert!(config.api_key.is_none());
        assert!(config.base_url.contains("localhost"));
        assert_eq!(config.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_config_builder() {
        let config = OpenAiConfig::openai("key")
            .with_base_url("http://custom.api/")
            .with_model("gpt-4o")
            .with_name("custom")
            .with_timeout(Duration::from_secs(60))
            .with_max_retries(0);

        assert_eq!(config.model, Some("gpt-4o".to_string()));
        assert_eq!(config.name, "custom");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 0);

        let backend = OpenAiBackend::new(config).unwrap();
        assert_eq!(backend.completions_url(), "http://custom.api/chat/completions");
        assert_eq!(backend.name(), "custom");
    }

    #[test]
    fn test_completions_url() {
        let backend = OpenAiBackend::new(OpenAiConfig::openai("key")).unwrap();
        assert_eq!(
            backend.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_from_env_var_missing() {
        let result = OpenAiConfig::from_env_var("THOUGHTFUL_TEST_UNSET_KEY_VAR");
        assert!(matches!(result, Err(LlmError::Config(_))));
    }

    #[test]
    fn test_to_openai_request_with_system() {
        let backend = OpenAiBackend::new(OpenAiConfig::openai("key")).unwrap();
        let request = CompletionRequest::chat("sys", "user text", 0.3).with_max_tokens(50);

        let openai_req = backend.to_openai_request(&request);
        assert_eq!(openai_req.model, DEFAULT_CHAT_MODEL);
        assert_eq!(openai_req.messages.len(), 2);
        assert_eq!(openai_req.messages[0].role, "system");
        assert_eq!(openai_req.messages[1].content, "user text");
        assert_eq!(openai_req.max_tokens, Some(50));
        assert_eq!(openai_req.temperature, Some(0.3));
        assert!(openai_req.stop.is_none());
    }

    #[test]
    fn test_model_precedence() {
        let request = CompletionRequest::new("x").with_model("from-request");

        let backend = OpenAiBackend::new(OpenAiConfig::openai("key")).unwrap();
        assert_eq!(backend.to_openai_request(&request).model, "from-request");

        let backend =
            OpenAiBackend::new(OpenAiConfig::openai("key").with_model("from-config")).unwrap();
        assert_eq!(backend.to_openai_request(&request).model, "from-config");
    }

    #[test]
    fn test_openai_response_conversion() {
        let openai_resp = OpenAiChatResponse {
            id: "chatcmpl-123".to_string(),
            choices: vec![OpenAiChoice {
                message: OpenAiResponseMessage {
                    content: Some("Hello!".to_string()),
                },
                finish_reason: Some("length".to_string()),
            }],
            model: "gpt-4o-mini".to_string(),
            usage: Some(OpenAiUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            }),
        };

        let response: CompletionResponse = openai_resp.into();
        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.text, "Hello!");
        assert_eq!(response.stop_reason, Some(StopReason::MaxTokens));
        assert_eq!(response.usage.total(), 15);
    }

    #[test]
    fn test_openai_response_without_choices() {
        let response: CompletionResponse = serde_json::from_str::<OpenAiChatResponse>(
            r#"{"id":"x","choices":[],"model":"m"}"#,
        )
        .unwrap()
        .into();
        assert!(response.text.is_empty());
        assert_eq!(response.usage, Usage::default());
    }
}
