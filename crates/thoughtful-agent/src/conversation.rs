//! Committed utterances.
//!
//! The [`Conversation`] owns the append-only utterance log and a roster of
//! participants it does not own. Only the turn loop appends to it, after
//! conflict resolution, so every reader sees a consistent prefix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thoughtful_llm::{CompletionRequest, ServiceError};
use tracing::{debug, warn};

use crate::error::{AgentError, Result};
use crate::participant::ParticipantRef;
use crate::prompt;
use crate::types::{ConversationConfig, Services};
use thoughtful_types::IdKind;

/// A one-sentence reading of what a speaker meant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// One committed contribution to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub id: String,
    pub participant_id: String,
    pub participant_name: String,
    pub text: String,
    pub embedding: Vec<f32>,
    /// 1-based position in the conversation.
    pub turn_number: u64,
    /// Simulation round the utterance was committed in.
    pub round: u64,
    pub weight: f32,
    /// Thought this utterance expresses, if it came from an agent.
    pub thought_id: Option<String>,
    pub interpretation: Option<Interpretation>,
    pub created_at: DateTime<Utc>,
}

impl Utterance {
    /// `"<name>: <text>"`, as shown in prompts and stored in memory.
    pub fn line(&self) -> String {
        format!("{}: {}", self.participant_name, self.text)
    }
}

/// Input for [`Conversation::add_utterance`].
#[derive(Debug, Clone)]
pub struct NewUtterance {
    pub participant_id: String,
    pub text: String,
    pub weight: f32,
    pub thought_id: Option<String>,
    /// Reused instead of embedding the text again.
    pub embedding: Option<Vec<f32>>,
    pub round: u64,
}

impl NewUtterance {
    pub fn new(participant_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            text: text.into(),
            weight: 1.0,
            thought_id: None,
            embedding: None,
            round: 0,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_thought(mut self, thought_id: impl Into<String>) -> Self {
        self.thought_id = Some(thought_id.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn at_round(mut self, round: u64) -> Self {
        self.round = round;
        self
    }
}

/// Ordered log of utterances between a fixed set of participants.
#[derive(Debug)]
pub struct Conversation {
    topic: String,
    participants: Vec<ParticipantRef>,
    utterances: Vec<Utterance>,
    services: Services,
    config: ConversationConfig,
}

impl Conversation {
    pub fn create(
        participants: Vec<ParticipantRef>,
        topic: impl Into<String>,
        services: Services,
        config: ConversationConfig,
    ) -> Result<Self> {
        let topic = topic.into();
        if participants.is_empty() {
            return Err(AgentError::validation("At least one participant is required"));
        }
        if topic.trim().is_empty() {
            return Err(AgentError::validation("Topic cannot be empty"));
        }
        Ok(Self {
            topic,
            participants,
            utterances: Vec::new(),
            services,
            config,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn participants(&self) -> &[ParticipantRef] {
        &self.participants
    }

    pub fn participant(&self, id: &str) -> Option<&ParticipantRef> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    pub fn last(&self) -> Option<&Utterance> {
        self.utterances.last()
    }

    /// The last `n` utterances, oldest first.
    pub fn recent(&self, n: usize) -> &[Utterance] {
        let start = self.utterances.len().saturating_sub(n);
        &self.utterances[start..]
    }

    pub fn get(&self, id: &str) -> Option<&Utterance> {
        self.utterances.iter().find(|u| u.id == id)
    }

    /// Turn number of the last committed utterance; 0 before the first.
    pub fn turn_number(&self) -> u64 {
        self.utterances.len() as u64
    }

    /// Validate, embed, interpret and append an utterance.
    ///
    /// Every await happens before the append, so a failure or a dropped
    /// future leaves the log unchanged. Interpretation failures only log.
    pub async fn add_utterance(&mut self, new: NewUtterance) -> Result<&Utterance> {
        if new.text.trim().is_empty() {
            return Err(AgentError::validation("Empty text provided for utterance"));
        }
        let speaker = self
            .participant(&new.participant_id)
            .ok_or_else(|| {
                AgentError::validation(format!("Unknown participant: {}", new.participant_id))
            })?
            .clone();

        let embedding = match new.embedding {
            Some(embedding) => embedding,
            None => self
                .services
                .embedder
                .embed(&new.text)
                .await
                .map_err(ServiceError::Embedding)?,
        };

        let interpretation = if self.config.interpretation {
            self.interpret(&speaker.name, &new.text).await
        } else {
            None
        };

        let utterance = Utterance {
            id: self.services.ids.next_id(IdKind::Utterance),
            participant_id: speaker.id,
            participant_name: speaker.name,
            text: new.text,
            embedding,
            turn_number: self.turn_number() + 1,
            round: new.round,
            weight: new.weight,
            thought_id: new.thought_id,
            interpretation,
            created_at: Utc::now(),
        };
        debug!(
            utterance_id = %utterance.id,
            participant_id = %utterance.participant_id,
            turn = utterance.turn_number,
            "Committed utterance"
        );

        let index = self.utterances.len();
        self.utterances.push(utterance);
        Ok(&self.utterances[index])
    }

    /// Ask the backend what the speaker meant. `None` on any failure.
    async fn interpret(&self, speaker: &str, text: &str) -> Option<Interpretation> {
        let (system, user) =
            prompt::interpretation_prompt(speaker, text, self.recent(self.config.context_window));
        let request = CompletionRequest::new(user).with_system(system);

        let response = match self.services.backend.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, speaker, "Interpretation failed, continuing without one");
                return None;
            }
        };
        let text = response.trimmed().to_string();
        if text.is_empty() {
            return None;
        }
        match self.services.embedder.embed(&text).await {
            Ok(embedding) => Some(Interpretation { text, embedding }),
            Err(e) => {
                warn!(error = %e, speaker, "Interpretation embedding failed, continuing without one");
                None
            }
        }
    }
}
