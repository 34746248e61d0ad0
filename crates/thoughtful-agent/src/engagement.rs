//! Engagement decisions and turn resolution.
//!
//! Each agent runs a small state machine per turn:
//!
//! ```text
//! idle ─begin()─▶ evaluating ─decide()─▶ silent | wants_to_speak | wants_to_interrupt
//!   ▲                                                    │
//!   └──────────────────────── reset() ◀──────────────────┘
//! ```
//!
//! The decision compares a *comparison score* against the agent's thresholds:
//!
//! ```text
//! comparison = thought.score + bias + starvation_weight · turns_since_last_speak
//! bias       = ±proactive_bias under proactive_tone (+ self-initiated, − reactive)
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::participant::ParticipantInfo;
use crate::thought::{Thought, ThoughtKind, ThoughtReservoir};
use crate::types::{AgentConfig, EngagementConfig};

/// Where a participant is in its per-turn engagement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementState {
    #[default]
    Idle,
    Evaluating,
    Silent,
    WantsToSpeak,
    WantsToInterrupt,
}

impl EngagementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Evaluating => "evaluating",
            Self::Silent => "silent",
            Self::WantsToSpeak => "wants_to_speak",
            Self::WantsToInterrupt => "wants_to_interrupt",
        }
    }

    /// True for the two states that compete for the floor.
    pub fn is_signal(&self) -> bool {
        matches!(self, Self::WantsToSpeak | Self::WantsToInterrupt)
    }
}

impl std::fmt::Display for EngagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One participant's outcome for a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub participant_id: String,
    pub state: EngagementState,
    /// Comparison score; 0 when silent.
    pub score: f32,
    pub turns_since_last_speak: u64,
    /// Source thought, for agents.
    pub thought_id: Option<String>,
    /// What would be said if this decision wins.
    pub content: Option<String>,
    /// Embedding of `content`, reused when committing.
    pub embedding: Option<Vec<f32>>,
}

impl Decision {
    pub fn silent(participant_id: impl Into<String>, turns_since_last_speak: u64) -> Self {
        Self {
            participant_id: participant_id.into(),
            state: EngagementState::Silent,
            score: 0.0,
            turns_since_last_speak,
            thought_id: None,
            content: None,
            embedding: None,
        }
    }

    pub fn is_signal(&self) -> bool {
        self.state.is_signal() && self.content.is_some()
    }
}

/// Per-agent engagement state machine.
#[derive(Debug, Clone)]
pub struct EngagementEngine {
    config: EngagementConfig,
    state: EngagementState,
}

impl EngagementEngine {
    pub fn new(config: EngagementConfig) -> Self {
        Self {
            config,
            state: EngagementState::Idle,
        }
    }

    pub fn config(&self) -> &EngagementConfig {
        &self.config
    }

    pub fn state(&self) -> EngagementState {
        self.state
    }

    /// Idle → evaluating.
    pub fn begin(&mut self) {
        self.state = EngagementState::Evaluating;
    }

    /// Back to idle, ready for the next turn.
    pub fn reset(&mut self) {
        self.state = EngagementState::Idle;
    }

    pub fn comparison_score(&self, thought: &Thought, agent: &AgentConfig, turns_since_last_speak: u64) -> f32 {
        let bias = if agent.proactive_tone {
            match thought.kind {
                ThoughtKind::SelfInitiated => self.config.proactive_bias,
                ThoughtKind::Reactive => -self.config.proactive_bias,
            }
        } else {
            0.0
        };
        thought.score + bias + self.config.starvation_weight * turns_since_last_speak as f32
    }

    /// Queued thought with the highest comparison score, and that score.
    pub fn best<'a>(
        &self,
        reservoir: &'a ThoughtReservoir,
        agent: &AgentConfig,
        turns_since_last_speak: u64,
    ) -> Option<(&'a Thought, f32)> {
        reservoir
            .queued()
            .map(|t| (t, self.comparison_score(t, agent, turns_since_last_speak)))
            .max_by(|(a, sa), (b, sb)| {
                sa.partial_cmp(sb)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.turn_created.cmp(&a.turn_created))
                    .then_with(|| b.id.cmp(&a.id))
            })
    }

    /// Decide without changing state.
    ///
    /// `other_holds_floor` is true when someone other than this participant
    /// spoke last; only then can the decision be an interrupt.
    pub fn evaluate(
        &self,
        info: &ParticipantInfo,
        agent: &AgentConfig,
        reservoir: &ThoughtReservoir,
        other_holds_floor: bool,
    ) -> Decision {
        let tsls = info.turns_since_last_speak;
        let Some((thought, score)) = self.best(reservoir, agent, tsls) else {
            return Decision::silent(&info.id, tsls);
        };

        let state = if score >= agent.interrupt_threshold && other_holds_floor {
            EngagementState::WantsToInterrupt
        } else if score >= agent.im_threshold {
            EngagementState::WantsToSpeak
        } else {
            return Decision::silent(&info.id, tsls);
        };

        Decision {
            participant_id: info.id.clone(),
            state,
            score,
            turns_since_last_speak: tsls,
            thought_id: Some(thought.id.clone()),
            content: Some(thought.content.clone()),
            embedding: Some(thought.embedding.clone()),
        }
    }

    /// Decide and move to the resulting state.
    pub fn decide(
        &mut self,
        info: &ParticipantInfo,
        agent: &AgentConfig,
        reservoir: &ThoughtReservoir,
        other_holds_floor: bool,
    ) -> Decision {
        let decision = self.evaluate(info, agent, reservoir, other_holds_floor);
        self.state = decision.state;
        decision
    }

    /// Settle as silent, e.g. after a timeout.
    pub fn force_silent(&mut self, info: &ParticipantInfo) -> Decision {
        self.state = EngagementState::Silent;
        Decision::silent(&info.id, info.turns_since_last_speak)
    }
}

/// Pick at most one speaker for the turn.
///
/// Interrupts preempt speak signals. Within a category the highest
/// comparison score wins; ties go to the lower `turns_since_last_speak`,
/// then the smaller participant id.
pub fn resolve(decisions: &[Decision]) -> Option<&Decision> {
    let signals = || decisions.iter().filter(|d| d.is_signal());
    let interrupts: Vec<&Decision> = signals()
        .filter(|d| d.state == EngagementState::WantsToInterrupt)
        .collect();
    let pool = if interrupts.is_empty() {
        signals().collect()
    } else {
        interrupts
    };

    pool.into_iter().min_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.turns_since_last_speak.cmp(&b.turns_since_last_speak))
            .then_with(|| a.participant_id.cmp(&b.participant_id))
    })
}
