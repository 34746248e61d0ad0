//! System prompt builder implementation.
//!
//! Provides a fluent builder for assembling system prompts from modular sections.

use thoughtful_memory::RecallMatch;

use crate::conversation::Utterance;

use super::mode::PromptMode;

/// Builder for the system half of a thought prompt.
///
/// Sections are joined with double newlines. Which context sections appear
/// depends on the [`PromptMode`].
///
/// # Example
///
/// ```rust,ignore
/// let system = SystemPromptBuilder::new()
///     .with_mode(PromptMode::Deliberate)
///     .with_identity("Ada")
///     .with_topic("tides")
///     .with_memories(&recalled)
///     .with_context(conversation.recent(10))
///     .with_instructions("List up to 3 thoughts.")
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct SystemPromptBuilder {
    mode: PromptMode,
    identity: Option<String>,
    topic: Option<String>,
    memories: Vec<String>,
    context: Vec<String>,
    instructions: Option<String>,
}

impl SystemPromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: PromptMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the name the model speaks as.
    pub fn with_identity(mut self, name: impl Into<String>) -> Self {
        self.identity = Some(name.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Add retrieved memories, most salient first.
    pub fn with_memories(mut self, memories: &[RecallMatch]) -> Self {
        self.memories = memories.iter().map(|m| m.memory.text.clone()).collect();
        self
    }

    /// Add recent utterances, oldest first.
    pub fn with_context(mut self, utterances: &[Utterance]) -> Self {
        self.context = utterances.iter().map(Utterance::line).collect();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn build(self) -> String {
        let mut sections: Vec<String> = Vec::new();

        if let Some(identity) = self.build_identity_section() {
            sections.push(identity);
        }

        if self.mode.include_memories()
            && let Some(memories) = Self::build_list_section("# What you remember", &self.memories)
        {
            sections.push(memories);
        }

        if self.mode.include_context()
            && let Some(context) = Self::build_list_section("# Conversation so far", &self.context)
        {
            sections.push(context);
        }

        if let Some(instructions) = self.instructions.filter(|s| !s.is_empty()) {
            sections.push(instructions);
        }

        sections.join("\n\n")
    }

    fn build_identity_section(&self) -> Option<String> {
        let name = self.identity.as_ref()?;
        Some(match &self.topic {
            Some(topic) => format!(
                "You are {name}, a participant in a conversation about {topic}. \
                 You think continuously, whether or not it is your turn to speak."
            ),
            None => format!("You are {name}, a participant in a conversation."),
        })
    }

    fn build_list_section(title: &str, lines: &[String]) -> Option<String> {
        if lines.is_empty() {
            return None;
        }
        let mut out = vec![title.to_string()];
        out.extend(lines.iter().map(|l| format!("- {l}")));
        Some(out.join("\n"))
    }
}
