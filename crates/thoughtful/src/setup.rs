//! Mapping from the file config to runtime config and services.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use thoughtful_agent::{
    AgentConfig, AgentSettings, ConversationConfig, EngagementConfig, EvaluationWeights, Services,
    ThoughtConfig,
};
use thoughtful_config::{AgentEntry, Provider, ThoughtfulConfig};
use thoughtful_llm::{EmbedderSpec, OpenAiBackend, OpenAiConfig, SharedBackend, build_embedder};
use thoughtful_memory::SaliencyConfig;
use thoughtful_types::RandomIds;

use crate::rehearsal;

pub fn agent_config(entry: &AgentEntry) -> AgentConfig {
    AgentConfig {
        im_threshold: entry.im_threshold,
        system1_prob: entry.system1_prob,
        interrupt_threshold: entry.interrupt_threshold,
        proactive_tone: entry.proactive_tone,
        seed: entry.seed,
    }
}

pub fn agent_settings(config: &ThoughtfulConfig) -> AgentSettings {
    let memory = config.memory();
    let thoughts = config.thoughts();
    let engagement = config.engagement();

    let saliency = SaliencyConfig {
        relevance_weight: memory.relevance_weight,
        importance_weight: memory.importance_weight,
        recency_weight: memory.recency_weight,
        frequency_weight: memory.frequency_weight,
        recency_decay: memory.recency_decay,
        decay_factor: memory.decay_factor,
        refresh_rate: memory.refresh_rate,
        prune_floor: memory.prune_floor,
        working_window: (memory.working_window > 0).then_some(memory.working_window),
    };

    let thought_config = ThoughtConfig {
        capacity: thoughts.capacity,
        deliberate_candidates: thoughts.deliberate_candidates,
        decay_factor: thoughts.decay_factor,
        floor: thoughts.floor,
        horizon: thoughts.horizon,
        system1_temperature: thoughts.system1_temperature,
        system2_temperature: thoughts.system2_temperature,
        weights: EvaluationWeights {
            relevance: thoughts.weights.relevance,
            novelty: thoughts.weights.novelty,
            urgency: thoughts.weights.urgency,
        },
        context_window: thoughts.context_window,
    };

    AgentSettings::new()
        .with_memory(saliency)
        .with_retrieval_k(memory.retrieval_k)
        .with_thoughts(thought_config)
        .with_engagement(EngagementConfig {
            proactive_bias: engagement.proactive_bias,
            starvation_weight: engagement.starvation_weight,
            human_score: engagement.human_score,
        })
}

pub fn conversation_config(config: &ThoughtfulConfig) -> ConversationConfig {
    let conversation = config.conversation();
    ConversationConfig::default()
        .with_turn_timeout(Duration::from_millis(conversation.turn_timeout_ms))
        .with_interpretation(conversation.interpretation)
        .with_context_window(conversation.context_window)
        .with_max_silent_rounds(conversation.max_silent_rounds)
}

/// Build the embedding and completion services. `mock` overrides both
/// providers.
pub fn build_services(config: &ThoughtfulConfig, mock: bool) -> Result<Services> {
    let embedding = config.embedding();
    let provider = match (mock, embedding.provider) {
        (true, Provider::Openai) => Provider::MockLexical,
        (_, provider) => provider,
    };
    let spec = EmbedderSpec {
        provider: provider.as_str().to_string(),
        openai_api_key: match provider {
            Provider::Openai => std::env::var(&embedding.api_key_env).ok(),
            _ => None,
        },
        openai_model: Some(embedding.model.clone()),
        openai_base_url: embedding.base_url.clone(),
        dimensions: embedding.dimensions,
        max_retries: Some(config.llm().max_retries),
    };
    let embedder = build_embedder(&spec).context("Failed to build embedding service")?;

    let backend = if mock || config.llm().provider.is_mock() {
        rehearsal::backend()
    } else {
        openai_backend(config)?
    };

    tracing::info!(
        embedder = embedder.name(),
        backend = backend.name(),
        "Services ready"
    );
    Ok(Services::new(embedder, backend, RandomIds::shared()))
}

fn openai_backend(config: &ThoughtfulConfig) -> Result<SharedBackend> {
    let llm = config.llm();
    let mut openai = OpenAiConfig::from_env_var(&llm.api_key_env)
        .with_context(|| format!("Set {} or run with --mock", llm.api_key_env))?
        .with_model(llm.model.as_str())
        .with_max_retries(llm.max_retries);
    if let Some(base_url) = llm.base_url.as_deref() {
        openai = openai.with_base_url(base_url);
    }
    if let Some(secs) = llm.timeout_secs {
        openai = openai.with_timeout(Duration::from_secs(secs));
    }
    let backend: SharedBackend = Arc::new(
        OpenAiBackend::new(openai).context("Failed to build completion service")?,
    );
    Ok(backend)
}
