//! Memory records.

use serde::{Deserialize, Serialize};

/// Which tier a memory lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Transient, per-conversation; prunable.
    Working,
    /// Persistent; never pruned by decay.
    LongTerm,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Working => "working",
            MemoryType::LongTerm => "long_term",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single memory owned by one agent's store.
///
/// The embedding and the bookkeeping fields are read-only from outside the
/// crate; only the owning [`MemoryStore`](crate::MemoryStore) changes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    pub agent_id: String,
    pub text: String,
    pub weight: f32,
    pub memory_type: MemoryType,
    /// Turn the memory was created.
    pub turn_number: u64,
    embedding: Vec<f32>,
    saliency: f32,
    last_accessed_turn: u64,
    retrieval_count: u32,
    /// Turn up to which decay has already been applied.
    last_decayed_turn: u64,
}

impl MemoryItem {
    pub(crate) fn new(
        id: String,
        agent_id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        weight: f32,
        memory_type: MemoryType,
        turn_number: u64,
    ) -> Self {
        Self {
            id,
            agent_id: agent_id.into(),
            text: text.into(),
            weight,
            memory_type,
            turn_number,
            embedding,
            saliency: 1.0,
            last_accessed_turn: turn_number,
            retrieval_count: 0,
            last_decayed_turn: turn_number,
        }
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn saliency(&self) -> f32 {
        self.saliency
    }

    pub fn last_accessed_turn(&self) -> u64 {
        self.last_accessed_turn
    }

    pub fn retrieval_count(&self) -> u32 {
        self.retrieval_count
    }

    pub fn is_long_term(&self) -> bool {
        self.memory_type == MemoryType::LongTerm
    }

    /// Record a retrieval at `turn`, pulling saliency toward 1.0 by `refresh_rate`.
    pub(crate) fn touch(&mut self, turn: u64, refresh_rate: f32) {
        self.last_accessed_turn = self.last_accessed_turn.max(turn);
        self.retrieval_count = self.retrieval_count.saturating_add(1);
        self.saliency = (self.saliency + (1.0 - self.saliency) * refresh_rate).clamp(0.0, 1.0);
        self.last_decayed_turn = self.last_decayed_turn.max(turn);
    }

    /// Apply decay for every turn elapsed since the last decay.
    ///
    /// Returns true if saliency changed.
    pub(crate) fn decay_to(&mut self, turn: u64, factor: f32) -> bool {
        if turn <= self.last_decayed_turn {
            return false;
        }
        let elapsed = (turn - self.last_decayed_turn).min(i32::MAX as u64) as i32;
        self.saliency = (self.saliency * factor.powi(elapsed)).max(0.0);
        self.last_decayed_turn = turn;
        true
    }
}

/// A memory selected by retrieval, with the score that ranked it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecallMatch {
    pub memory: MemoryItem,
    /// Composite saliency score.
    pub score: f32,
    /// Cosine similarity to the query, one component of `score`.
    pub similarity: f32,
}
