//! Dual-process thought generation.
//!
//! With probability `system1_prob` an agent takes the fast path: one reactive
//! candidate from the trigger alone, at a higher temperature. Otherwise it
//! deliberates: several candidates conditioned on retrieved memories and the
//! recent conversation.

use rand::Rng;
use thoughtful_llm::{CompletionRequest, ServiceError};
use thoughtful_memory::RecallMatch;
use thoughtful_types::IdKind;
use tracing::debug;

use crate::conversation::Utterance;
use crate::error::{AgentError, Result};
use crate::prompt::{self, INITIATE_TAG, RESPOND_TAG};
use crate::types::Services;

use super::{Thought, ThoughtKind, ThoughtReservoir};

const FAST_MAX_TOKENS: u32 = 120;
const DELIBERATE_MAX_TOKENS: u32 = 400;

/// Which generation path was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPath {
    /// System 1.
    Fast,
    /// System 2.
    Deliberate,
}

/// Inputs to one generation.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub agent_name: &'a str,
    pub topic: &'a str,
    pub trigger: &'a Utterance,
    pub memories: &'a [RecallMatch],
    pub context: &'a [Utterance],
    pub turn: u64,
    pub system1_prob: f32,
}

impl ThoughtReservoir {
    /// Pick a path: fast with probability `system1_prob`.
    pub fn choose_path<R: Rng + ?Sized>(system1_prob: f32, rng: &mut R) -> GenerationPath {
        if rng.random::<f32>() < system1_prob {
            GenerationPath::Fast
        } else {
            GenerationPath::Deliberate
        }
    }

    /// Generate pending thoughts for a trigger, with embeddings.
    ///
    /// The reservoir is not modified; pass the evaluated result to
    /// [`add`](Self::add).
    pub async fn generate<R: Rng + ?Sized>(
        &self,
        services: &Services,
        request: &GenerationRequest<'_>,
        rng: &mut R,
    ) -> Result<Vec<Thought>> {
        let path = Self::choose_path(request.system1_prob, rng);
        let candidates = match path {
            GenerationPath::Fast => self.fast_candidates(services, request).await?,
            GenerationPath::Deliberate => self.deliberate_candidates(services, request).await?,
        };
        debug!(
            agent_id = %self.agent_id(),
            ?path,
            candidates = candidates.len(),
            turn = request.turn,
            "Generated candidates"
        );
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = candidates.iter().map(|(text, _)| text.as_str()).collect();
        let embeddings = services
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(ServiceError::Embedding)?;
        if embeddings.len() != candidates.len() {
            return Err(AgentError::internal(format!(
                "expected {} embeddings, got {}",
                candidates.len(),
                embeddings.len()
            )));
        }

        Ok(candidates
            .into_iter()
            .zip(embeddings)
            .map(|((content, kind), embedding)| {
                Thought::new(
                    services.ids.next_id(IdKind::Thought),
                    self.agent_id(),
                    content,
                    embedding,
                    &request.trigger.id,
                    kind,
                    request.turn,
                )
            })
            .collect())
    }

    async fn fast_candidates(
        &self,
        services: &Services,
        request: &GenerationRequest<'_>,
    ) -> Result<Vec<(String, ThoughtKind)>> {
        let (system, user) = prompt::fast_thought_prompt(request.agent_name, request.topic, request.trigger);
        let completion = CompletionRequest::chat(system, user, self.config().system1_temperature)
            .with_max_tokens(FAST_MAX_TOKENS);
        let response = services
            .backend
            .complete(completion)
            .await
            .map_err(ServiceError::Completion)?;

        Ok(parse_candidates(&response.text, 1)
            .into_iter()
            .map(|(content, _)| (content, ThoughtKind::Reactive))
            .collect())
    }

    async fn deliberate_candidates(
        &self,
        services: &Services,
        request: &GenerationRequest<'_>,
    ) -> Result<Vec<(String, ThoughtKind)>> {
        let max = self.config().deliberate_candidates;
        let (system, user) = prompt::deliberate_thought_prompt(
            request.agent_name,
            request.topic,
            request.trigger,
            request.memories,
            request.context,
            max,
        );
        let completion = CompletionRequest::chat(system, user, self.config().system2_temperature)
            .with_max_tokens(DELIBERATE_MAX_TOKENS);
        let response = services
            .backend
            .complete(completion)
            .await
            .map_err(ServiceError::Completion)?;

        Ok(parse_candidates(&response.text, max))
    }
}

/// Split a completion into at most `max` tagged candidates.
///
/// List markers, tags and wrapping quotes are stripped and empty lines are
/// dropped. Untagged lines are self-initiated.
pub fn parse_candidates(text: &str, max: usize) -> Vec<(String, ThoughtKind)> {
    text.lines()
        .filter_map(|line| {
            let line = strip_list_marker(line.trim());
            let (kind, rest) = strip_tag(line);
            let content = strip_quotes(rest.trim()).trim();
            (!content.is_empty()).then(|| (content.to_string(), kind))
        })
        .take(max)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    for marker in ['-', '*', '•'] {
        if let Some(rest) = line.strip_prefix(marker)
            && (rest.is_empty() || rest.starts_with(char::is_whitespace))
        {
            return rest.trim_start();
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }
    line
}

fn strip_tag(line: &str) -> (ThoughtKind, &str) {
    let lower = line.to_ascii_lowercase();
    if lower.starts_with(RESPOND_TAG) {
        (ThoughtKind::Reactive, &line[RESPOND_TAG.len()..])
    } else if lower.starts_with(INITIATE_TAG) {
        (ThoughtKind::SelfInitiated, &line[INITIATE_TAG.len()..])
    } else {
        (ThoughtKind::SelfInitiated, line)
    }
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}
