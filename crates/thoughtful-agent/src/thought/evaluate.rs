//! Thought evaluation.
//!
//! ```text
//! score = w_r · relevance + w_n · novelty + w_u · urgency     (clamped to [0, 1])
//!
//! relevance = max(0, cos(thought, trigger))
//! novelty   = 1 − max(0, max cos(thought, long-term memory))   (1 with no memories)
//! urgency   = (u − 1) / 4 for the model's rating u ∈ 1..=5
//! ```

use serde::Deserialize;
use thoughtful_llm::{CompletionRequest, ServiceError, cosine_similarity};
use thoughtful_memory::MemoryItem;
use tracing::{debug, warn};

use crate::conversation::Utterance;
use crate::error::Result;
use crate::prompt;
use crate::types::Services;

use super::{Thought, ThoughtReservoir, ThoughtStatus};

const EVALUATION_TEMPERATURE: f32 = 0.0;
const EVALUATION_MAX_TOKENS: u32 = 200;
/// Rating assumed when the model gives none.
const NEUTRAL_URGENCY: f32 = 3.0;

/// Inputs to one evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub agent_name: &'a str,
    pub topic: &'a str,
    pub trigger: &'a Utterance,
    pub context: &'a [Utterance],
    pub long_term: &'a [MemoryItem],
    pub im_threshold: f32,
}

/// An urgency rating read from a completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Urgency {
    pub reasoning: String,
    /// Normalized to [0, 1].
    pub level: f32,
    /// False when the reply was not the expected JSON.
    pub structured: bool,
}

#[derive(Deserialize)]
struct RawUrgency {
    #[serde(default)]
    reasoning: String,
    urgency: f32,
}

impl ThoughtReservoir {
    /// Score pending thoughts, returning them queued or discarded.
    ///
    /// Thoughts that are not pending are passed through unchanged. The
    /// reservoir itself is not modified.
    pub async fn evaluate(
        &self,
        services: &Services,
        pending: Vec<Thought>,
        request: &EvaluationRequest<'_>,
    ) -> Result<Vec<Thought>> {
        let weights = self.config().weights;
        let mut evaluated = Vec::with_capacity(pending.len());

        for mut thought in pending {
            if thought.status != ThoughtStatus::Pending {
                evaluated.push(thought);
                continue;
            }

            let relevance = cosine_similarity(&thought.embedding, &request.trigger.embedding).max(0.0);
            let novelty = novelty(&thought.embedding, request.long_term);
            let urgency = self.rate_urgency(services, request, &thought.content).await?;

            let score = weights.relevance * relevance
                + weights.novelty * novelty
                + weights.urgency * urgency.level;
            thought.apply_evaluation(urgency.reasoning, score, request.im_threshold);

            debug!(
                agent_id = %self.agent_id(),
                thought_id = %thought.id,
                relevance,
                novelty,
                urgency = urgency.level,
                score = thought.score,
                status = %thought.status,
                "Evaluated thought"
            );
            evaluated.push(thought);
        }
        Ok(evaluated)
    }

    async fn rate_urgency(
        &self,
        services: &Services,
        request: &EvaluationRequest<'_>,
        content: &str,
    ) -> Result<Urgency> {
        let (system, user) = prompt::evaluation_prompt(
            request.agent_name,
            request.topic,
            request.trigger,
            request.context,
            content,
        );
        let completion = CompletionRequest::chat(system, user, EVALUATION_TEMPERATURE)
            .with_max_tokens(EVALUATION_MAX_TOKENS);
        let response = services
            .backend
            .complete(completion)
            .await
            .map_err(ServiceError::Completion)?;

        let urgency = parse_urgency(&response.text);
        if !urgency.structured {
            warn!(
                agent_id = %self.agent_id(),
                reply = %response.trimmed(),
                level = urgency.level,
                "Urgency reply was not JSON, using fallback rating"
            );
        }
        Ok(urgency)
    }
}

/// 1 minus the closest long-term match; 1 when there is nothing to match.
fn novelty(embedding: &[f32], long_term: &[MemoryItem]) -> f32 {
    let closest = long_term
        .iter()
        .map(|m| cosine_similarity(embedding, m.embedding()))
        .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))));
    match closest {
        Some(similarity) => 1.0 - similarity.max(0.0),
        None => 1.0,
    }
}

/// Read an urgency rating from a completion.
///
/// Expects `{"reasoning": ..., "urgency": 1..5}`, possibly wrapped in other
/// text. Otherwise the first digit 1-5 is used, else a neutral 3, with the
/// raw text as reasoning.
pub fn parse_urgency(text: &str) -> Urgency {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
        && start < end
        && let Ok(raw) = serde_json::from_str::<RawUrgency>(&text[start..=end])
        && raw.urgency.is_finite()
    {
        return Urgency {
            reasoning: raw.reasoning,
            level: normalize(raw.urgency),
            structured: true,
        };
    }

    let rating = text
        .chars()
        .find(|c| ('1'..='5').contains(c))
        .and_then(|c| c.to_digit(10))
        .map(|d| d as f32)
        .unwrap_or(NEUTRAL_URGENCY);
    Urgency {
        reasoning: text.trim().to_string(),
        level: normalize(rating),
        structured: false,
    }
}

fn normalize(rating: f32) -> f32 {
    (rating.clamp(1.0, 5.0) - 1.0) / 4.0
}
