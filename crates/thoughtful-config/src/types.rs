//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [llm]             # completion backend
//! [embedding]       # embedding backend
//! [memory]          # saliency weights and decay
//! [thoughts]        # reservoir and evaluation
//! [engagement]      # bias and anti-starvation
//! [conversation]    # topic, timeout, interpretation
//! [[agents]]        # one entry per agent
//! [[humans]]        # one entry per human
//! ```
//!
//! Every section is optional; missing keys take the defaults shown in each
//! `Default` impl.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. a project-local
/// override) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThoughtfulConfig {
    pub llm: Option<LlmSection>,
    pub embedding: Option<EmbeddingSection>,
    pub memory: Option<MemorySection>,
    pub thoughts: Option<ThoughtsSection>,
    pub engagement: Option<EngagementSection>,
    pub conversation: Option<ConversationSection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub humans: Vec<HumanEntry>,
}

impl ThoughtfulConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole. A non-empty `[[agents]]` or `[[humans]]`
    /// list replaces the existing one.
    pub fn merge(&mut self, other: ThoughtfulConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.embedding.is_some() {
            self.embedding = other.embedding;
        }
        if other.memory.is_some() {
            self.memory = other.memory;
        }
        if other.thoughts.is_some() {
            self.thoughts = other.thoughts;
        }
        if other.engagement.is_some() {
            self.engagement = other.engagement;
        }
        if other.conversation.is_some() {
            self.conversation = other.conversation;
        }
        if !other.agents.is_empty() {
            self.agents = other.agents;
        }
        if !other.humans.is_empty() {
            self.humans = other.humans;
        }
    }

    pub fn llm(&self) -> LlmSection {
        self.llm.clone().unwrap_or_default()
    }

    pub fn embedding(&self) -> EmbeddingSection {
        self.embedding.clone().unwrap_or_default()
    }

    pub fn memory(&self) -> MemorySection {
        self.memory.clone().unwrap_or_default()
    }

    pub fn thoughts(&self) -> ThoughtsSection {
        self.thoughts.clone().unwrap_or_default()
    }

    pub fn engagement(&self) -> EngagementSection {
        self.engagement.clone().unwrap_or_default()
    }

    pub fn conversation(&self) -> ConversationSection {
        self.conversation.clone().unwrap_or_default()
    }

    /// Check what can be checked without building anything.
    pub fn validate(&self) -> Result<()> {
        for (i, agent) in self.agents.iter().enumerate() {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("agents[{i}]: name cannot be empty")));
            }
            for (key, value) in [
                ("im_threshold", agent.im_threshold),
                ("system1_prob", agent.system1_prob),
                ("interrupt_threshold", agent.interrupt_threshold),
            ] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::Invalid(format!(
                        "agents[{i}] ({}): {key} must be in [0, 1], got {value}",
                        agent.name
                    )));
                }
            }
        }
        if let Some(human) = self.humans.iter().find(|h| h.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "humans: name cannot be empty (got {:?})",
                human.name
            )));
        }
        if self.conversation().turn_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "conversation.turn_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────────────────

/// Which implementation backs a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    #[default]
    Openai,
    Mock,
    /// Word-overlap mock embeddings; embedding only.
    MockLexical,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Mock => "mock",
            Self::MockLexical => "mock-lexical",
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock | Self::MockLexical)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[llm]`: the completion backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: Provider,
    /// Defaults to the provider's public endpoint.
    pub base_url: Option<String>,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_retries: u32,
    pub timeout_secs: Option<u64>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: Provider::Openai,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_retries: 3,
            timeout_secs: None,
        }
    }
}

/// `[embedding]`: the embedding backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub provider: Provider,
    pub base_url: Option<String>,
    pub model: String,
    pub api_key_env: String,
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: Provider::Openai,
            base_url: None,
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimensions: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cognitive engine
// ─────────────────────────────────────────────────────────────────────────────

/// `[memory]`: saliency scoring and decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub relevance_weight: f32,
    pub importance_weight: f32,
    pub recency_weight: f32,
    pub frequency_weight: f32,
    pub recency_decay: f32,
    pub decay_factor: f32,
    pub refresh_rate: f32,
    pub prune_floor: f32,
    /// Turns a working memory may go unused; 0 disables.
    pub working_window: u64,
    pub retrieval_k: usize,
}

impl Default for MemorySection {
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
            working_window: 50,
            retrieval_k: 5,
        }
    }
}

/// `[thoughts.weights]`: evaluation weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsSection {
    pub relevance: f32,
    pub novelty: f32,
    pub urgency: f32,
}

impl Default for WeightsSection {
    fn default() -> Self {
        Self {
            relevance: 0.4,
            novelty: 0.2,
            urgency: 0.4,
        }
    }
}

/// `[thoughts]`: reservoir bounds, decay and generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThoughtsSection {
    pub capacity: usize,
    pub deliberate_candidates: usize,
    pub decay_factor: f32,
    pub floor: f32,
    pub horizon: u64,
    pub system1_temperature: f32,
    pub system2_temperature: f32,
    pub context_window: usize,
    pub weights: WeightsSection,
}

impl Default for ThoughtsSection {
    fn default() -> Self {
        Self {
            capacity: 16,
            deliberate_candidates: 3,
            decay_factor: 0.8,
            floor: 0.1,
            horizon: 5,
            system1_temperature: 0.9,
            system2_temperature: 0.7,
            context_window: 10,
            weights: WeightsSection::default(),
        }
    }
}

/// `[engagement]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementSection {
    pub proactive_bias: f32,
    pub starvation_weight: f32,
    pub human_score: f32,
}

impl Default for EngagementSection {
    fn default() -> Self {
        Self {
            proactive_bias: 0.1,
            starvation_weight: 0.02,
            human_score: 1.0,
        }
    }
}

/// `[conversation]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSection {
    pub topic: Option<String>,
    pub turn_timeout_ms: u64,
    pub interpretation: bool,
    pub context_window: usize,
    pub max_silent_rounds: u32,
}

impl Default for ConversationSection {
    fn default() -> Self {
        Self {
            topic: None,
            turn_timeout_ms: 30_000,
            interpretation: true,
            context_window: 10,
            max_silent_rounds: 3,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Participants
// ─────────────────────────────────────────────────────────────────────────────

/// One `[[agents]]` entry. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentEntry {
    pub name: String,
    pub persona: String,
    #[serde(default = "default_im_threshold")]
    pub im_threshold: f32,
    #[serde(default = "default_system1_prob")]
    pub system1_prob: f32,
    #[serde(default = "default_interrupt_threshold")]
    pub interrupt_threshold: f32,
    #[serde(default)]
    pub proactive_tone: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_im_threshold() -> f32 {
    0.5
}

fn default_system1_prob() -> f32 {
    0.3
}

fn default_interrupt_threshold() -> f32 {
    0.8
}

/// One `[[humans]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanEntry {
    pub name: String,
}
