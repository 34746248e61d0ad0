//! Identifier generation.
//!
//! All ids follow the `"<prefix>-<uuid>"` format, e.g. `agent-5f0c...`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of entity an identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    Agent,
    Human,
    Utterance,
    Memory,
    Thought,
}

impl IdKind {
    /// The string prefix used for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            IdKind::Agent => "agent",
            IdKind::Human => "human",
            IdKind::Utterance => "utterance",
            IdKind::Memory => "memory",
            IdKind::Thought => "thought",
        }
    }

    /// Format a UUID as an id of this kind.
    pub fn format(&self, uuid: Uuid) -> String {
        format!("{}-{}", self.prefix(), uuid)
    }

    /// Returns true if `id` carries this kind's prefix followed by a UUID.
    pub fn matches(&self, id: &str) -> bool {
        id.strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|rest| Uuid::parse_str(rest).is_ok())
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Source of unique identifiers.
pub trait IdGenerator: Send + Sync {
    /// Mint a new id of the given kind.
    fn next_id(&self, kind: IdKind) -> String;
}

/// Shared, thread-safe identifier generator.
pub type SharedIdGenerator = Arc<dyn IdGenerator>;

/// Random v4 UUIDs. The default for real runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl RandomIds {
    pub fn shared() -> SharedIdGenerator {
        Arc::new(Self)
    }
}

impl IdGenerator for RandomIds {
    fn next_id(&self, kind: IdKind) -> String {
        kind.format(Uuid::new_v4())
    }
}

/// Deterministic ids built from a monotonically increasing counter.
///
/// The first id minted is `<prefix>-00000000-0000-0000-0000-000000000001`.
/// The counter is shared across kinds, so ids also reflect creation order.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Start the sequence at `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    pub fn shared() -> SharedIdGenerator {
        Arc::new(Self::new())
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, kind: IdKind) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        kind.format(Uuid::from_u128(u128::from(n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_have_prefix() {
        let ids = RandomIds;
        let id = ids.next_id(IdKind::Agent);
        assert!(id.starts_with("agent-"));
        assert!(IdKind::Agent.matches(&id));
        assert!(!IdKind::Human.matches(&id));
    }

    #[test]
    fn test_random_ids_are_unique() {
        let ids = RandomIds;
        assert_ne!(ids.next_id(IdKind::Memory), ids.next_id(IdKind::Memory));
    }

    #[test]
    fn test_sequential_ids_are_deterministic() {
        let a = SequentialIds::new();
        let b = SequentialIds::new();
        for kind in [IdKind::Agent, IdKind::Utterance, IdKind::Memory] {
            assert_eq!(a.next_id(kind), b.next_id(kind));
        }
    }

    #[test]
    fn test_sequential_ids_format() {
        let ids = SequentialIds::new();
        assert_eq!(
            ids.next_id(IdKind::Human),
            "human-00000000-0000-0000-0000-000000000001"
        );
        assert_eq!(
            ids.next_id(IdKind::Utterance),
            "utterance-00000000-0000-0000-0000-000000000002"
        );
    }

    #[test]
    fn test_sequential_ids_sort_in_creation_order() {
        let ids = SequentialIds::starting_at(9);
        let first = ids.next_id(IdKind::Thought);
        let second = ids.next_id(IdKind::Thought);
        assert!(first < second);
    }

    #[test]
    fn test_matches_rejects_malformed() {
        assert!(!IdKind::Memory.matches("memory-"));
        assert!(!IdKind::Memory.matches("memory-not-a-uuid"));
        assert!(!IdKind::Memory.matches("memory00000000-0000-0000-0000-000000000001"));
    }
}
