//! Proactive conversational agents.
//!
//! Agents here think continuously, whether or not it is their turn, and
//! decide for themselves when to speak or interject.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  ConversationLoop                                             │
//! │  - Broadcasts the last utterance to every participant         │
//! │  - Runs them concurrently under a timeout and cancel token    │
//! │  - Resolves one speaker and commits the utterance             │
//! └───────────────────────────────────────────────────────────────┘
//!                               │
//!               ┌───────────────┴───────────────┐
//!               ▼                               ▼
//!        ┌─────────────┐                 ┌─────────────┐
//!        │   Agent     │                 │   Human     │
//!        └─────────────┘                 └─────────────┘
//!          │    │    │
//!          ▼    ▼    ▼
//!   MemoryStore  ThoughtReservoir  EngagementEngine
//! ```
//!
//! # Core Components
//!
//! - [`Agent`]: memory, thoughts and engagement for one persona
//! - [`ThoughtReservoir`]: dual-process generation, evaluation and decay
//! - [`EngagementEngine`]: speak / wait / interrupt decisions
//! - [`ConversationLoop`]: turn-taking and conflict resolution

pub mod agent;
pub mod conversation;
pub mod engagement;
pub mod error;
pub mod human;
pub mod participant;
pub mod prompt;
pub mod simulator;
pub mod thought;
pub mod types;

pub use agent::{Agent, PreparedTurn};
pub use conversation::{Conversation, Interpretation, NewUtterance, Utterance};
pub use engagement::{Decision, EngagementEngine, EngagementState, resolve};
pub use error::{AgentError, Result};
pub use human::{Human, HumanInput, ScriptedInput, StdinInput};
pub use participant::{Participant, ParticipantInfo, ParticipantRef, Proposal, Role};
pub use simulator::{ConversationLoop, TurnContext, TurnReport};
pub use thought::{
    GenerationPath, Thought, ThoughtKind, ThoughtReservoir, ThoughtStatus, parse_candidates,
    parse_urgency,
};
pub use types::{
    AgentConfig, AgentSettings, ConversationConfig, EngagementConfig, EvaluationWeights, Services,
    ThoughtConfig,
};
