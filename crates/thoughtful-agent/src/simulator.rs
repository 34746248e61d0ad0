//! The turn loop.
//!
//! One call to [`ConversationLoop::run_turn`]:
//!
//! 1. takes the last committed utterance as the trigger,
//! 2. prepares every participant concurrently under a per-turn timeout and
//!    a shared cancellation token,
//! 3. applies the prepared state once every participant has settled,
//! 4. resolves at most one speaker,
//! 5. commits the winning utterance, and
//! 6. lets every agent observe it and age its thoughts and memories.
//!
//! Participants run as futures on the caller's task, so nothing is shared
//! across threads. Each agent only ever writes to its own state.

use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::conversation::{Conversation, NewUtterance, Utterance};
use crate::engagement::{Decision, resolve};
use crate::error::{AgentError, Result};
use crate::participant::{Participant, Proposal};
use crate::types::{ConversationConfig, Services};

// ─────────────────────────────────────────────────────────────────────────────
// Turn Context
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only view of the conversation handed to participants each turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub conversation: &'a Conversation,
    /// The utterance everyone is reacting to.
    pub trigger: &'a Utterance,
    /// Simulation round, which also advances on silent turns.
    pub round: u64,
}

impl<'a> TurnContext<'a> {
    pub fn new(conversation: &'a Conversation, trigger: &'a Utterance, round: u64) -> Self {
        Self {
            conversation,
            trigger,
            round,
        }
    }

    /// Id of whoever spoke last.
    pub fn floor_holder(&self) -> Option<&'a str> {
        self.conversation.last().map(|u| u.participant_id.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn Report
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one round.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    pub round: u64,
    /// Participant id of the speaker, if anyone spoke.
    pub speaker: Option<String>,
    pub utterance_id: Option<String>,
    /// Every participant's decision, in roster order.
    pub decisions: Vec<Decision>,
    /// Participants that did not decide within the timeout.
    pub timed_out: Vec<String>,
}

impl TurnReport {
    pub fn is_silent(&self) -> bool {
        self.speaker.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Drives a conversation between agents and humans, one round at a time.
#[derive(Debug)]
pub struct ConversationLoop {
    conversation: Conversation,
    participants: Vec<Participant>,
    round: u64,
    silent_rounds: u32,
}

impl ConversationLoop {
    /// Loop over an existing conversation. Every participant must be on its
    /// roster.
    pub fn new(conversation: Conversation, participants: Vec<Participant>) -> Result<Self> {
        if let Some(stranger) = participants
            .iter()
            .find(|p| conversation.participant(p.id()).is_none())
        {
            return Err(AgentError::validation(format!(
                "Participant {} is not in the conversation",
                stranger.id()
            )));
        }
        Ok(Self {
            conversation,
            participants,
            round: 0,
            silent_rounds: 0,
        })
    }

    /// Create the conversation from the participants themselves.
    pub fn from_participants(
        participants: Vec<Participant>,
        topic: impl Into<String>,
        services: Services,
        config: ConversationConfig,
    ) -> Result<Self> {
        let roster = participants.iter().map(|p| p.info().to_ref()).collect();
        let conversation = Conversation::create(roster, topic, services, config)?;
        Self::new(conversation, participants)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id() == id)
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.participant(id).and_then(Participant::as_agent)
    }

    /// Rounds completed so far.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Consecutive rounds in which nobody spoke.
    pub fn silent_rounds(&self) -> u32 {
        self.silent_rounds
    }

    /// Commit an utterance outside the turn loop and let every agent hear it.
    pub async fn open(&mut self, participant_id: &str, text: &str) -> Result<Utterance> {
        let utterance = self
            .conversation
            .add_utterance(NewUtterance::new(participant_id, text).at_round(self.round))
            .await?
            .clone();
        self.broadcast(&utterance, None)?;
        info!(
            speaker = %utterance.participant_name,
            turn = utterance.turn_number,
            "Conversation opened"
        );
        Ok(utterance)
    }

    /// Run rounds until `turns` have passed or the conversation goes quiet
    /// for `max_silent_rounds` in a row.
    pub async fn run(&mut self, turns: usize) -> Result<Vec<TurnReport>> {
        let max_silent = self.conversation.config().max_silent_rounds;
        let mut reports = Vec::with_capacity(turns);
        for _ in 0..turns {
            reports.push(self.run_turn().await?);
            if max_silent > 0 && self.silent_rounds >= max_silent {
                info!(
                    round = self.round,
                    silent_rounds = self.silent_rounds,
                    "Conversation went quiet, stopping"
                );
                break;
            }
        }
        Ok(reports)
    }

    /// Run one round.
    ///
    /// Participants prepare concurrently and nothing is applied until all
    /// of them have settled. A service error from any participant cancels
    /// the others and is returned with every participant unchanged; the
    /// round is not counted. A participant that times out is treated as
    /// silent.
    pub async fn run_turn(&mut self) -> Result<TurnReport> {
        let round = self.round + 1;
        let timeout = self.conversation.config().turn_timeout;
        let token = CancellationToken::new();

        let (decisions, timed_out) = {
            let Self {
                conversation,
                participants,
                ..
            } = self;
            let trigger = conversation
                .last()
                .ok_or_else(|| AgentError::validation("Conversation has not been opened"))?;
            let ctx = TurnContext::new(conversation, trigger, round);
            debug!(round, trigger = %trigger.id, "Starting turn");

            let outcomes = join_all(
                participants
                    .iter_mut()
                    .map(|participant| prepare_within(participant, &ctx, &token, timeout)),
            )
            .await;

            settle(participants, &ctx, outcomes)
        }
        .inspect_err(|_| token.cancel())?;

        let winner = resolve(&decisions).cloned();
        let committed = match &winner {
            Some(decision) => Some(self.commit(decision, round).await.inspect_err(|_| token.cancel())?),
            None => None,
        };
        token.cancel();

        self.broadcast_turn(winner.as_ref(), committed.as_ref(), round)?;

        self.round = round;
        self.silent_rounds = if committed.is_some() {
            0
        } else {
            self.silent_rounds.saturating_add(1)
        };

        match &committed {
            Some(utterance) => info!(
                round,
                turn = utterance.turn_number,
                speaker = %utterance.participant_name,
                text = %utterance.text,
                "Committed utterance"
            ),
            None => info!(round, "Nobody spoke"),
        }

        Ok(TurnReport {
            round,
            speaker: committed.as_ref().map(|u| u.participant_id.clone()),
            utterance_id: committed.map(|u| u.id),
            decisions,
            timed_out,
        })
    }

    async fn commit(&mut self, decision: &Decision, round: u64) -> Result<Utterance> {
        let text = decision
            .content
            .as_deref()
            .ok_or_else(|| AgentError::internal("winning decision has no content"))?;
        let mut new = NewUtterance::new(&decision.participant_id, text).at_round(round);
        if let Some(thought_id) = &decision.thought_id {
            new = new.with_thought(thought_id);
        }
        if let Some(embedding) = &decision.embedding {
            new = new.with_embedding(embedding.clone());
        }
        Ok(self.conversation.add_utterance(new).await?.clone())
    }

    /// Update counters and agent state after a round.
    fn broadcast_turn(
        &mut self,
        winner: Option<&Decision>,
        committed: Option<&Utterance>,
        round: u64,
    ) -> Result<()> {
        if let Some(decision) = winner
            && let Some(thought_id) = decision.thought_id.as_deref()
            && let Some(agent) = self
                .participants
                .iter_mut()
                .find(|p| p.id() == decision.participant_id)
                .and_then(Participant::as_agent_mut)
        {
            agent.mark_expressed(thought_id);
        }

        match committed {
            Some(utterance) => self.broadcast(utterance, Some(round))?,
            None => {
                for participant in &mut self.participants {
                    participant.info_mut().record_silent();
                }
            }
        }

        for agent in self.participants.iter_mut().filter_map(Participant::as_agent_mut) {
            agent.end_turn(round);
        }
        Ok(())
    }

    /// Record who spoke and store the utterance in every agent's memory.
    fn broadcast(&mut self, utterance: &Utterance, round: Option<u64>) -> Result<()> {
        let round = round.unwrap_or(self.round);
        for participant in &mut self.participants {
            if participant.id() == utterance.participant_id {
                participant.info_mut().record_spoke(utterance.turn_number);
            } else {
                participant.info_mut().record_silent();
            }
            if let Some(agent) = participant.as_agent_mut() {
                agent.observe(utterance, round)?;
            }
        }
        Ok(())
    }
}

type Outcome = std::result::Result<Result<Proposal>, tokio::time::error::Elapsed>;

/// Prepare one participant, cancelling its siblings if it fails.
async fn prepare_within(
    participant: &mut Participant,
    ctx: &TurnContext<'_>,
    token: &CancellationToken,
    timeout: Duration,
) -> Outcome {
    let outcome = tokio::time::timeout(timeout, participant.prepare(ctx, token)).await;
    if let Ok(Err(e)) = &outcome
        && !e.is_cancelled()
    {
        token.cancel();
    }
    outcome
}

/// Apply every proposal, or return the first real error having applied none.
fn settle(
    participants: &mut [Participant],
    ctx: &TurnContext<'_>,
    outcomes: Vec<Outcome>,
) -> Result<(Vec<Decision>, Vec<String>)> {
    let round = ctx.round;
    let mut proposals = Vec::with_capacity(outcomes.len());
    let mut timed_out = Vec::new();

    for (participant, outcome) in participants.iter().zip(outcomes) {
        match outcome {
            Ok(Ok(proposal)) => proposals.push(Some(proposal)),
            Ok(Err(e)) if e.is_cancelled() => proposals.push(None),
            Ok(Err(e)) => {
                warn!(participant_id = %participant.id(), round, error = %e, "Participant failed");
                return Err(e);
            }
            Err(_) => {
                warn!(participant_id = %participant.id(), round, "Participant timed out, treating as silent");
                timed_out.push(participant.id().to_string());
                proposals.push(None);
            }
        }
    }

    let decisions = participants
        .iter_mut()
        .zip(proposals)
        .map(|(participant, proposal)| match proposal {
            Some(proposal) => participant.commit(ctx, proposal),
            None => participant.abandon_turn(),
        })
        .collect();
    Ok((decisions, timed_out))
}
