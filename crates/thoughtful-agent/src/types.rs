//! Runtime configuration and shared service handles.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thoughtful_llm::{SharedBackend, SharedEmbedder};
use thoughtful_memory::SaliencyConfig;
use thoughtful_types::SharedIdGenerator;

use crate::error::{AgentError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Agent Config
// ─────────────────────────────────────────────────────────────────────────────

/// Per-agent behavior thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Minimum thought score for the agent to want to speak.
    pub im_threshold: f32,
    /// Probability of taking the fast (System 1) generation path.
    pub system1_prob: f32,
    /// Minimum score to take the floor from another speaker.
    pub interrupt_threshold: f32,
    /// Prefer initiating over responding.
    pub proactive_tone: bool,
    /// Seed for the agent's random source. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            im_threshold: 0.5,
            system1_prob: 0.3,
            interrupt_threshold: 0.8,
            proactive_tone: false,
            seed: None,
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_im_threshold(mut self, threshold: f32) -> Self {
        self.im_threshold = threshold;
        self
    }

    pub fn with_system1_prob(mut self, prob: f32) -> Self {
        self.system1_prob = prob;
        self
    }

    pub fn with_interrupt_threshold(mut self, threshold: f32) -> Self {
        self.interrupt_threshold = threshold;
        self
    }

    pub fn with_proactive_tone(mut self, proactive: bool) -> Self {
        self.proactive_tone = proactive;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check every threshold lies in [0, 1].
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("im_threshold", self.im_threshold),
            ("system1_prob", self.system1_prob),
            ("interrupt_threshold", self.interrupt_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AgentError::validation(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Thought Config
// ─────────────────────────────────────────────────────────────────────────────

/// Weights of the three evaluation signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationWeights {
    pub relevance: f32,
    pub novelty: f32,
    pub urgency: f32,
}

impl Default for EvaluationWeights {
    fn default() -> Self {
        Self {
            relevance: 0.4,
            novelty: 0.2,
            urgency: 0.4,
        }
    }
}

/// Thought generation, evaluation and aging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThoughtConfig {
    /// Maximum thoughts held in the reservoir.
    pub capacity: usize,
    /// Upper bound on candidates from one deliberate generation.
    pub deliberate_candidates: usize,
    /// Per-turn score multiplier for thoughts still waiting.
    pub decay_factor: f32,
    /// Thoughts decayed below this score are dropped.
    pub floor: f32,
    /// Thoughts older than this many turns are dropped.
    pub horizon: u64,
    pub system1_temperature: f32,
    pub system2_temperature: f32,
    pub weights: EvaluationWeights,
    /// Recent utterances shown to deliberate generation.
    pub context_window: usize,
}

impl Default for ThoughtConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            deliberate_candidates: 3,
            decay_factor: 0.8,
            floor: 0.1,
            horizon: 5,
            system1_temperature: 0.9,
            system2_temperature: 0.7,
            weights: EvaluationWeights::default(),
            context_window: 10,
        }
    }
}

impl ThoughtConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_deliberate_candidates(mut self, n: usize) -> Self {
        self.deliberate_candidates = n;
        self
    }

    pub fn with_decay(mut self, factor: f32, floor: f32, horizon: u64) -> Self {
        self.decay_factor = factor;
        self.floor = floor;
        self.horizon = horizon;
        self
    }

    pub fn with_weights(mut self, weights: EvaluationWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(AgentError::validation("thought capacity must be at least 1"));
        }
        if self.deliberate_candidates == 0 {
            return Err(AgentError::validation(
                "deliberate_candidates must be at least 1",
            ));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(AgentError::validation(format!(
                "thought decay_factor must be in (0, 1), got {}",
                self.decay_factor
            )));
        }
        let w = self.weights;
        if [w.relevance, w.novelty, w.urgency]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(AgentError::validation(
                "evaluation weights must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engagement Config
// ─────────────────────────────────────────────────────────────────────────────

/// Tuning for turning thoughts into speak/interrupt signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    /// Score shift applied under `proactive_tone`.
    pub proactive_bias: f32,
    /// Added to the comparison score per turn of silence.
    pub starvation_weight: f32,
    /// Comparison score of a human who chooses to speak.
    pub human_score: f32,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            proactive_bias: 0.1,
            starvation_weight: 0.02,
            human_score: 1.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Settings
// ─────────────────────────────────────────────────────────────────────────────

/// Everything an agent needs besides its thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub memory: SaliencyConfig,
    /// Memories retrieved per turn.
    pub retrieval_k: usize,
    pub thoughts: ThoughtConfig,
    pub engagement: EngagementConfig,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            memory: SaliencyConfig::default(),
            retrieval_k: 5,
            thoughts: ThoughtConfig::default(),
            engagement: EngagementConfig::default(),
        }
    }
}

impl AgentSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory(mut self, memory: SaliencyConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    pub fn with_thoughts(mut self, thoughts: ThoughtConfig) -> Self {
        self.thoughts = thoughts;
        self
    }

    pub fn with_engagement(mut self, engagement: EngagementConfig) -> Self {
        self.engagement = engagement;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.memory
            .validate()
            .map_err(|e| AgentError::validation(e.to_string()))?;
        self.thoughts.validate()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation Config
// ─────────────────────────────────────────────────────────────────────────────

/// Turn loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationConfig {
    /// Per-participant budget for one turn.
    pub turn_timeout: Duration,
    /// Whether committed utterances are interpreted.
    pub interpretation: bool,
    /// Recent utterances shown to the interpretation prompt.
    pub context_window: usize,
    /// `run` stops after this many consecutive silent rounds.
    pub max_silent_rounds: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(30),
            interpretation: true,
            context_window: 10,
            max_silent_rounds: 3,
        }
    }
}

impl ConversationConfig {
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn with_interpretation(mut self, enabled: bool) -> Self {
        self.interpretation = enabled;
        self
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    pub fn with_max_silent_rounds(mut self, rounds: u32) -> Self {
        self.max_silent_rounds = rounds;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────────────────

/// External collaborators shared by agents and the conversation.
#[derive(Clone)]
pub struct Services {
    pub embedder: SharedEmbedder,
    pub backend: SharedBackend,
    pub ids: SharedIdGenerator,
}

impl Services {
    pub fn new(embedder: SharedEmbedder, backend: SharedBackend, ids: SharedIdGenerator) -> Self {
        Self {
            embedder,
            backend,
            ids,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("embedder", &self.embedder.name())
            .field("backend", &self.backend.name())
            .finish()
    }
}
