//! Proactive agents.
//!
//! An [`Agent`] owns its memory, its thought reservoir and its engagement
//! engine. Every turn it runs
//!
//! ```text
//! rank memories ─▶ generate thoughts ─▶ evaluate ─┬─▶ commit retrieval
//!      (pure)        (suspends)        (suspends)  ├─▶ add to reservoir
//!                                                  └─▶ engagement decision
//! ```
//!
//! [`Agent::prepare`] holds every suspension point and only reads the agent;
//! [`Agent::commit`] applies the result synchronously. A pipeline that is
//! cancelled, times out or fails leaves the agent exactly as it was.

use rand::SeedableRng;
use rand::rngs::StdRng;
use thoughtful_memory::{MemoryStore, MemoryType, RecallMatch, TextSplitter};
use thoughtful_types::IdKind;
use tokio_util::sync::CancellationToken;

use crate::conversation::Utterance;
use crate::engagement::{Decision, EngagementEngine};
use crate::error::{AgentError, Result};
use crate::participant::{ParticipantInfo, Role};
use crate::simulator::TurnContext;
use crate::thought::{EvaluationRequest, GenerationRequest, Thought, ThoughtReservoir};
use crate::types::{AgentConfig, AgentSettings, Services};

/// Weight of persona memories.
const PERSONA_WEIGHT: f32 = 1.0;
/// Persona memories predate the conversation.
const PERSONA_TURN: u64 = 0;

/// Everything one turn's pipeline would write, not yet applied.
#[derive(Debug)]
pub struct PreparedTurn {
    round: u64,
    memories: Vec<RecallMatch>,
    thoughts: Vec<Thought>,
    rng: StdRng,
}

impl PreparedTurn {
    /// Memories the pipeline retrieved, best first.
    pub fn memories(&self) -> &[RecallMatch] {
        &self.memories
    }

    /// Evaluated thoughts waiting to enter the reservoir.
    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// A participant that thinks continuously and decides when to speak.
pub struct Agent {
    info: ParticipantInfo,
    persona: String,
    config: AgentConfig,
    settings: AgentSettings,
    services: Services,
    memory: MemoryStore,
    reservoir: ThoughtReservoir,
    engagement: EngagementEngine,
    rng: StdRng,
}

impl Agent {
    /// Create an agent, seeding long-term memory from its persona.
    ///
    /// The persona is split into sentences and each becomes a long-term
    /// memory at turn 0 with weight 1.0. Any failure, including an embedding
    /// failure on one chunk, aborts creation.
    pub async fn create(
        name: impl Into<String>,
        persona: impl Into<String>,
        config: AgentConfig,
        settings: AgentSettings,
        services: Services,
    ) -> Result<Self> {
        let name = name.into();
        let persona = persona.into();
        if persona.trim().is_empty() {
            return Err(AgentError::validation("Persona must be a non-empty string"));
        }
        if name.trim().is_empty() {
            return Err(AgentError::validation("Agent name cannot be empty"));
        }
        config.validate()?;
        settings.validate()?;

        let chunks = TextSplitter::new().split(&persona);
        if chunks.is_empty() {
            return Err(AgentError::validation("Persona produced no memories"));
        }

        let info = ParticipantInfo::new(services.ids.next_id(IdKind::Agent), name, Role::Agent);
        let mut memory = MemoryStore::new(
            services.embedder.clone(),
            services.ids.clone(),
            settings.memory.clone(),
        );
        for chunk in &chunks {
            memory
                .add(&info.id, chunk, PERSONA_WEIGHT, MemoryType::LongTerm, PERSONA_TURN)
                .await?;
        }
        tracing::info!(
            agent_id = %info.id,
            name = %info.name,
            memories = chunks.len(),
            "Created agent from persona"
        );

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let reservoir = ThoughtReservoir::new(&info.id, settings.thoughts.clone());
        let engagement = EngagementEngine::new(settings.engagement.clone());

        Ok(Self {
            info,
            persona,
            config,
            settings,
            services,
            memory,
            reservoir,
            engagement,
            rng,
        })
    }

    pub fn info(&self) -> &ParticipantInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut ParticipantInfo {
        &mut self.info
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn reservoir(&self) -> &ThoughtReservoir {
        &self.reservoir
    }

    pub fn engagement(&self) -> &EngagementEngine {
        &self.engagement
    }

    /// Whether this turn's decision competes for the floor.
    pub fn can_speak(&self, _ctx: &TurnContext<'_>) -> bool {
        self.engagement.state().is_signal()
    }

    /// What the agent would say now: its best queued thought.
    pub fn get_response(&self, ctx: &TurnContext<'_>) -> Option<String> {
        if !self.can_speak(ctx) {
            return None;
        }
        self.engagement
            .best(&self.reservoir, &self.config, self.info.turns_since_last_speak)
            .map(|(thought, _)| thought.content.clone())
    }

    /// Run the full pipeline for one trigger and decide whether to speak.
    ///
    /// Returns [`AgentError::Cancelled`] if `cancel` fires first; in that
    /// case nothing about the agent has changed.
    pub async fn think(&mut self, ctx: &TurnContext<'_>, cancel: &CancellationToken) -> Result<Decision> {
        let prepared = self.prepare(ctx, cancel).await?;
        Ok(self.commit(ctx, prepared))
    }

    /// Rank, generate and evaluate for one trigger without touching the agent.
    ///
    /// The trigger line itself is left out of retrieval. Pass the result to
    /// [`commit`](Self::commit) to apply it, or drop it to abandon the turn.
    pub async fn prepare(
        &self,
        ctx: &TurnContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<PreparedTurn> {
        let turn = ctx.round;
        let mut rng = self.rng.clone();

        let pipeline = async {
            let trigger_line = ctx.trigger.line();
            let memories = self.memory.rank_where(
                &ctx.trigger.embedding,
                turn,
                self.settings.retrieval_k,
                |item| item.text != trigger_line,
            );
            let context = ctx.conversation.recent(self.settings.thoughts.context_window);

            let generation = GenerationRequest {
                agent_name: &self.info.name,
                topic: ctx.conversation.topic(),
                trigger: ctx.trigger,
                memories: &memories,
                context,
                turn,
                system1_prob: self.config.system1_prob,
            };
            let pending = self
                .reservoir
                .generate(&self.services, &generation, &mut rng)
                .await?;

            let evaluation = EvaluationRequest {
                agent_name: &self.info.name,
                topic: ctx.conversation.topic(),
                trigger: ctx.trigger,
                context,
                long_term: self.memory.long_term(),
                im_threshold: self.config.im_threshold,
            };
            let thoughts = self
                .reservoir
                .evaluate(&self.services, pending, &evaluation)
                .await?;
            Ok::<_, AgentError>((memories, thoughts))
        };

        let (memories, thoughts) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(agent_id = %self.info.id, turn, "Pipeline cancelled before commit");
                return Err(AgentError::Cancelled);
            }
            result = pipeline => result?,
        };

        Ok(PreparedTurn {
            round: turn,
            memories,
            thoughts,
            rng,
        })
    }

    /// Apply a prepared turn and decide whether to speak.
    pub fn commit(&mut self, ctx: &TurnContext<'_>, prepared: PreparedTurn) -> Decision {
        let PreparedTurn {
            round: turn,
            memories,
            thoughts,
            rng,
        } = prepared;
        self.rng = rng;
        self.memory.apply_retrieval(&memories, turn);

        let generated = thoughts.len();
        let evicted = self.reservoir.add(thoughts);

        self.engagement.begin();
        let other_holds_floor = ctx.floor_holder().is_some_and(|holder| holder != self.info.id);
        let decision = self
            .engagement
            .decide(&self.info, &self.config, &self.reservoir, other_holds_floor);

        tracing::debug!(
            agent_id = %self.info.id,
            turn,
            retrieved = memories.len(),
            generated,
            evicted = evicted.len(),
            reservoir = self.reservoir.len(),
            state = %decision.state,
            score = decision.score,
            "Agent decided"
        );
        decision
    }

    /// Settle as silent after the pipeline was abandoned.
    pub fn abandon_turn(&mut self) -> Decision {
        self.engagement.force_silent(&self.info)
    }

    /// Store a committed utterance as a working memory.
    pub fn observe(&mut self, utterance: &Utterance, round: u64) -> Result<()> {
        self.memory.add_with_embedding(
            &self.info.id,
            &utterance.line(),
            utterance.embedding.clone(),
            utterance.weight,
            MemoryType::Working,
            round,
        )?;
        Ok(())
    }

    /// The thought was spoken; take it out of the reservoir.
    pub fn mark_expressed(&mut self, thought_id: &str) -> Option<Thought> {
        self.reservoir.mark_expressed(thought_id)
    }

    /// Age thoughts and memories to `round` and get ready for the next turn.
    pub fn end_turn(&mut self, round: u64) {
        let dropped = self.reservoir.decay(round);
        let decayed = self.memory.decay(round);
        let pruned = self.memory.prune(round);
        self.engagement.reset();

        tracing::debug!(
            agent_id = %self.info.id,
            round,
            thoughts_dropped = dropped.len(),
            memories_decayed = decayed,
            memories_pruned = pruned,
            "End of turn"
        );
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("info", &self.info)
            .field("config", &self.config)
            .field("memory", &self.memory)
            .field("thoughts", &self.reservoir.len())
            .field("state", &self.engagement.state())
            .field("services", &self.services)
            .finish()
    }
}
