//! Shared types for the thoughtful agent system.
//!
//! Identifier generation is injected rather than ambient: every constructor
//! that mints an id takes a [`SharedIdGenerator`], so tests can swap in
//! [`SequentialIds`] and get reproducible ids.

pub mod ids;

pub use ids::{IdGenerator, IdKind, RandomIds, SequentialIds, SharedIdGenerator};
