//! Human participants.
//!
//! A human's reply comes from a [`HumanInput`]; the loop only sees optional
//! text.

use std::collections::VecDeque;
use std::io::Write;

use async_trait::async_trait;
use thoughtful_types::{IdKind, SharedIdGenerator};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

use crate::participant::{ParticipantInfo, Role};
use crate::simulator::TurnContext;

/// Source of a human's replies.
#[async_trait]
pub trait HumanInput: Send {
    /// Reply to the current turn, or `None` to stay silent.
    async fn respond(&mut self, ctx: &TurnContext<'_>) -> Option<String>;
}

/// Replies from a fixed queue; silent once exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    replies: VecDeque<Option<String>>,
}

impl ScriptedInput {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(|r| r.map(Into::into)).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

#[async_trait]
impl HumanInput for ScriptedInput {
    async fn respond(&mut self, _ctx: &TurnContext<'_>) -> Option<String> {
        self.replies.pop_front().flatten()
    }
}

/// Reads one line per turn from standard input.
pub struct StdinInput {
    name: String,
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl std::fmt::Debug for StdinInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdinInput").field("name", &self.name).finish()
    }
}

#[async_trait]
impl HumanInput for StdinInput {
    async fn respond(&mut self, _ctx: &TurnContext<'_>) -> Option<String> {
        print!("{}, your response (press Enter to skip): ", self.name);
        let _ = std::io::stdout().flush();
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to read from stdin");
                None
            }
        }
    }
}

/// A person in the conversation.
pub struct Human {
    info: ParticipantInfo,
    input: Box<dyn HumanInput>,
    score: f32,
}

impl Human {
    pub fn new(name: impl Into<String>, input: Box<dyn HumanInput>, ids: &SharedIdGenerator) -> Self {
        Self {
            info: ParticipantInfo::new(ids.next_id(IdKind::Human), name, Role::Human),
            input,
            score: 1.0,
        }
    }

    /// Comparison score used when this human chooses to speak.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn info(&self) -> &ParticipantInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut ParticipantInfo {
        &mut self.info
    }

    pub fn can_speak(&self, _ctx: &TurnContext<'_>) -> bool {
        true
    }

    /// Trimmed reply; blank replies count as silence.
    pub async fn get_response(&mut self, ctx: &TurnContext<'_>) -> Option<String> {
        let reply = self.input.respond(ctx).await?;
        let reply = reply.trim();
        (!reply.is_empty()).then(|| reply.to_string())
    }
}

impl std::fmt::Debug for Human {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Human")
            .field("info", &self.info)
            .field("score", &self.score)
            .finish_non_exhaustive()
    }
}
