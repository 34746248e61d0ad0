//! Prompt mode definitions.
//!
//! The mode controls which context sections a prompt carries.

use serde::{Deserialize, Serialize};

/// Which kind of completion a prompt is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// Fast reaction to the last utterance only.
    ///
    /// Includes: identity, topic.
    Fast,

    /// Slow, context-conditioned generation.
    ///
    /// Includes: identity, topic, retrieved memories, recent conversation.
    #[default]
    Deliberate,

    /// Scoring a candidate thought.
    ///
    /// Includes: identity, topic, recent conversation.
    Evaluation,
}

impl PromptMode {
    /// Check if this mode includes retrieved memories.
    pub fn include_memories(&self) -> bool {
        matches!(self, Self::Deliberate)
    }

    /// Check if this mode includes the recent conversation.
    pub fn include_context(&self) -> bool {
        matches!(self, Self::Deliberate | Self::Evaluation)
    }
}
