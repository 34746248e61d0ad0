//! Prompts for thought generation, evaluation and interpretation.
//!
//! Every function returns a `(system, user)` pair.

mod builder;
mod mode;

pub use builder::SystemPromptBuilder;
pub use mode::PromptMode;

use thoughtful_memory::RecallMatch;

use crate::conversation::Utterance;

/// Tag marking a candidate that answers the last utterance.
pub const RESPOND_TAG: &str = "[respond]";
/// Tag marking a candidate that starts something new.
pub const INITIATE_TAG: &str = "[initiate]";

/// Fast path: react to the trigger alone.
pub fn fast_thought_prompt(agent_name: &str, topic: &str, trigger: &Utterance) -> (String, String) {
    let system = SystemPromptBuilder::new()
        .with_mode(PromptMode::Fast)
        .with_identity(agent_name)
        .with_topic(topic)
        .with_instructions(
            "Write the single thought that first comes to mind on hearing the line below. \
             One short sentence in the first person, phrased as something you might say. \
             Output only the thought.",
        )
        .build();
    (system, trigger.line())
}

/// Deliberate path: several candidates conditioned on memories and context.
pub fn deliberate_thought_prompt(
    agent_name: &str,
    topic: &str,
    trigger: &Utterance,
    memories: &[RecallMatch],
    context: &[Utterance],
    max_candidates: usize,
) -> (String, String) {
    let system = SystemPromptBuilder::new()
        .with_mode(PromptMode::Deliberate)
        .with_identity(agent_name)
        .with_topic(topic)
        .with_memories(memories)
        .with_context(context)
        .with_instructions(format!(
            "Think about what you could contribute next. Write up to {max_candidates} distinct \
             thoughts, one per line, each phrased as something you might say. Start a line with \
             {RESPOND_TAG} if it responds to the last line, or {INITIATE_TAG} if it brings up \
             something new. Output only the thoughts."
        ))
        .build();
    (system, format!("Last line: {}", trigger.line()))
}

/// Ask for the urgency of a candidate thought as JSON.
pub fn evaluation_prompt(
    agent_name: &str,
    topic: &str,
    trigger: &Utterance,
    context: &[Utterance],
    thought: &str,
) -> (String, String) {
    let system = SystemPromptBuilder::new()
        .with_mode(PromptMode::Evaluation)
        .with_identity(agent_name)
        .with_topic(topic)
        .with_context(context)
        .with_instructions(
            "Rate how urgent it is for you to say the thought below right now, from 1 (can \
             wait or never be said) to 5 (must be said immediately). Reply with JSON only: \
             {\"reasoning\": \"<one sentence>\", \"urgency\": <1-5>}",
        )
        .build();
    let user = format!("Last line: {}\nThought: {}", trigger.line(), thought);
    (system, user)
}

/// Interpret what a speaker just said, given the lines before it.
pub fn interpretation_prompt(speaker: &str, text: &str, context: &[Utterance]) -> (String, String) {
    let lines = context
        .iter()
        .map(Utterance::line)
        .collect::<Vec<_>>()
        .join("\n");
    let system = format!(
        "You are playing a role as a participant in a conversation. Your name in the conversation is {speaker}.\n\
         Given the last few lines of the conversation:\n{lines}\n\
         Interpret what {speaker} just said in the context of the conversation and what {speaker} might be thinking. \
         Be as succinct as possible and use a single sentence."
    );
    let user = format!("Utterance: {speaker}: {text}\nInterpretation: ");
    (system, user)
}
