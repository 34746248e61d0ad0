//! Conversation participants.
//!
//! Agents and humans share one capability set, `can_speak` and
//! `get_response`, plus the turn-taking counters in [`ParticipantInfo`].
//! [`Participant`] dispatches on the variant.

use serde::{Deserialize, Serialize};
use thoughtful_llm::ServiceError;
use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, PreparedTurn};
use crate::engagement::{Decision, EngagementState};
use crate::error::{AgentError, Result};
use crate::human::Human;
use crate::simulator::TurnContext;

/// Kind of participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Human,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Human => "human",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and turn-taking state common to every participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub turns_since_last_speak: u64,
    pub last_turn_spoken: u64,
}

impl ParticipantInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            turns_since_last_speak: 0,
            last_turn_spoken: 0,
        }
    }

    /// The participant's utterance was committed as turn `turn_number`.
    pub fn record_spoke(&mut self, turn_number: u64) {
        self.turns_since_last_speak = 0;
        self.last_turn_spoken = turn_number;
    }

    /// Someone else spoke, or nobody did.
    pub fn record_silent(&mut self) {
        self.turns_since_last_speak = self.turns_since_last_speak.saturating_add(1);
    }

    /// Non-owning roster entry for the conversation.
    pub fn to_ref(&self) -> ParticipantRef {
        ParticipantRef {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

/// A conversation's view of a participant it does not own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRef {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// An agent or a human taking part in a conversation.
#[derive(Debug)]
pub enum Participant {
    Agent(Box<Agent>),
    Human(Human),
}

/// A participant's turn, prepared but not yet applied.
#[derive(Debug)]
pub enum Proposal {
    Agent(PreparedTurn),
    /// The reply and its embedding, or `None` to stay silent.
    Human(Option<(String, Vec<f32>)>),
}

impl From<Agent> for Participant {
    fn from(agent: Agent) -> Self {
        Self::Agent(Box::new(agent))
    }
}

impl From<Human> for Participant {
    fn from(human: Human) -> Self {
        Self::Human(human)
    }
}

impl Participant {
    pub fn info(&self) -> &ParticipantInfo {
        match self {
            Self::Agent(agent) => agent.info(),
            Self::Human(human) => human.info(),
        }
    }

    pub fn info_mut(&mut self) -> &mut ParticipantInfo {
        match self {
            Self::Agent(agent) => agent.info_mut(),
            Self::Human(human) => human.info_mut(),
        }
    }

    pub fn id(&self) -> &str {
        &self.info().id
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn role(&self) -> Role {
        self.info().role
    }

    pub fn as_agent(&self) -> Option<&Agent> {
        match self {
            Self::Agent(agent) => Some(agent),
            Self::Human(_) => None,
        }
    }

    pub fn as_agent_mut(&mut self) -> Option<&mut Agent> {
        match self {
            Self::Agent(agent) => Some(agent),
            Self::Human(_) => None,
        }
    }

    pub fn can_speak(&self, ctx: &TurnContext<'_>) -> bool {
        match self {
            Self::Agent(agent) => agent.can_speak(ctx),
            Self::Human(human) => human.can_speak(ctx),
        }
    }

    pub async fn get_response(&mut self, ctx: &TurnContext<'_>) -> Option<String> {
        match self {
            Self::Agent(agent) => agent.get_response(ctx),
            Self::Human(human) => human.get_response(ctx).await,
        }
    }

    /// Do all of the turn's waiting without touching turn state.
    ///
    /// Agents run their think pipeline; humans are asked for a reply, which
    /// is embedded here so that committing it later cannot fail.
    pub async fn prepare(
        &mut self,
        ctx: &TurnContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Proposal> {
        match self {
            Self::Agent(agent) => agent.prepare(ctx, cancel).await.map(Proposal::Agent),
            Self::Human(human) => {
                let reply = async {
                    let Some(text) = human.get_response(ctx).await else {
                        return Ok(None);
                    };
                    let embedding = ctx
                        .conversation
                        .services()
                        .embedder
                        .embed(&text)
                        .await
                        .map_err(ServiceError::Embedding)?;
                    Ok::<_, AgentError>(Some((text, embedding)))
                };
                let reply = tokio::select! {
                    _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                    reply = reply => reply?,
                };
                Ok(Proposal::Human(reply))
            }
        }
    }

    /// Apply a prepared proposal and return the decision.
    ///
    /// A human reply counts as wanting to speak at the human's fixed score.
    pub fn commit(&mut self, ctx: &TurnContext<'_>, proposal: Proposal) -> Decision {
        match (self, proposal) {
            (Self::Agent(agent), Proposal::Agent(prepared)) => agent.commit(ctx, prepared),
            (Self::Human(human), Proposal::Human(Some((text, embedding)))) => {
                let info = human.info();
                Decision {
                    participant_id: info.id.clone(),
                    state: EngagementState::WantsToSpeak,
                    score: human.score(),
                    turns_since_last_speak: info.turns_since_last_speak,
                    thought_id: None,
                    content: Some(text),
                    embedding: Some(embedding),
                }
            }
            (participant, _) => {
                let info = participant.info();
                Decision::silent(&info.id, info.turns_since_last_speak)
            }
        }
    }

    /// Settle as silent after the turn was abandoned (timeout or cancellation).
    pub fn abandon_turn(&mut self) -> Decision {
        match self {
            Self::Agent(agent) => agent.abandon_turn(),
            Self::Human(human) => {
                let info = human.info();
                Decision::silent(&info.id, info.turns_since_last_speak)
            }
        }
    }
}
