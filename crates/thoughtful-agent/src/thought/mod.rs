//! Thoughts and the per-agent reservoir that holds them.
//!
//! A thought moves through
//!
//! ```text
//! pending ─▶ (evaluated) ─▶ queued_to_speak ─▶ expressed
//!                  │                 │
//!                  └──▶ discarded ◀──┘  (low score, decay, eviction, cancellation)
//! ```
//!
//! `evaluated` is transient. Scoring moves a thought straight on to
//! `queued_to_speak` or `discarded`, so the pipeline never stores one in it.

mod evaluate;
mod generate;
mod reservoir;

use serde::{Deserialize, Serialize};

pub use evaluate::{EvaluationRequest, Urgency, parse_urgency};
pub use generate::{GenerationPath, GenerationRequest, parse_candidates};
pub use reservoir::ThoughtReservoir;

/// Lifecycle status of a thought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtStatus {
    Pending,
    /// Scored but not yet sorted. Transient, see [`Thought::apply_evaluation`].
    Evaluated,
    QueuedToSpeak,
    Expressed,
    Discarded,
}

impl ThoughtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Evaluated => "evaluated",
            Self::QueuedToSpeak => "queued_to_speak",
            Self::Expressed => "expressed",
            Self::Discarded => "discarded",
        }
    }
}

impl std::fmt::Display for ThoughtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a thought answers the trigger or starts something new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtKind {
    Reactive,
    SelfInitiated,
}

/// A candidate contribution to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    pub id: String,
    pub agent_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Utterance that triggered this thought. Non-owning.
    pub trigger_id: String,
    pub kind: ThoughtKind,
    pub reasoning: String,
    pub score: f32,
    pub turn_created: u64,
    pub status: ThoughtStatus,
    last_decayed_turn: u64,
}

impl Thought {
    pub fn new(
        id: String,
        agent_id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
        trigger_id: impl Into<String>,
        kind: ThoughtKind,
        turn: u64,
    ) -> Self {
        Self {
            id,
            agent_id: agent_id.into(),
            content: content.into(),
            embedding,
            trigger_id: trigger_id.into(),
            kind,
            reasoning: String::new(),
            score: 0.0,
            turn_created: turn,
            status: ThoughtStatus::Pending,
            last_decayed_turn: turn,
        }
    }

    /// Set the evaluation outcome and advance the status.
    ///
    /// `Evaluated` is passed through immediately: the thought is either
    /// queued or discarded depending on `im_threshold`.
    pub fn apply_evaluation(&mut self, reasoning: impl Into<String>, score: f32, im_threshold: f32) {
        self.reasoning = reasoning.into();
        self.score = score.clamp(0.0, 1.0);
        self.status = if self.score >= im_threshold {
            ThoughtStatus::QueuedToSpeak
        } else {
            ThoughtStatus::Discarded
        };
    }

    pub fn is_queued(&self) -> bool {
        self.status == ThoughtStatus::QueuedToSpeak
    }

    pub fn age(&self, turn: u64) -> u64 {
        turn.saturating_sub(self.turn_created)
    }

    /// Turn-indexed decay; a second call for the same turn is a no-op.
    pub(crate) fn decay_to(&mut self, turn: u64, factor: f32) {
        if turn <= self.last_decayed_turn {
            return;
        }
        let elapsed = (turn - self.last_decayed_turn).min(i32::MAX as u64) as i32;
        self.score = (self.score * factor.powi(elapsed)).max(0.0);
        self.last_decayed_turn = turn;
    }
}
