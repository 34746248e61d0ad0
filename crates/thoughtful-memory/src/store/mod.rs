//! In-memory store for one agent's working and long-term memories.
//!
//! The store is owned by a single agent and mutated only through `&mut self`,
//! so no locking is needed. Operations are split so that callers can do all
//! of their awaiting first and all of their writing last:
//!
//! - [`MemoryStore::add`] embeds (the only suspension point) before touching state.
//! - [`MemoryStore::rank`] scores without mutating; [`MemoryStore::apply_retrieval`]
//!   commits the bookkeeping for a ranking. [`MemoryStore::retrieve`] does both.
//! - [`MemoryStore::decay`] and [`MemoryStore::prune`] age the store at the end of a turn.

mod decay;
mod recall;

use thoughtful_llm::{ServiceError, SharedEmbedder};
use thoughtful_types::{IdKind, SharedIdGenerator};
use tracing::debug;

use crate::config::SaliencyConfig;
use crate::error::Result;
use crate::types::{MemoryItem, MemoryType};
use crate::validation::{validate_embedding, validate_input};

/// Saliency-ranked memory for one agent.
pub struct MemoryStore {
    embedder: SharedEmbedder,
    ids: SharedIdGenerator,
    config: SaliencyConfig,
    working: Vec<MemoryItem>,
    long_term: Vec<MemoryItem>,
    /// Fixed by the first stored embedding.
    dimensions: Option<usize>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("embedder", &self.embedder.name())
            .field("working", &self.working.len())
            .field("long_term", &self.long_term.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl MemoryStore {
    pub fn new(embedder: SharedEmbedder, ids: SharedIdGenerator, config: SaliencyConfig) -> Self {
        Self {
            embedder,
            ids,
            config,
            working: Vec::new(),
            long_term: Vec::new(),
            dimensions: None,
        }
    }

    pub fn config(&self) -> &SaliencyConfig {
        &self.config
    }

    pub fn embedder(&self) -> &SharedEmbedder {
        &self.embedder
    }

    /// Embedding dimensionality, once the first item has been stored.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Embed `text` and store it as a new memory.
    ///
    /// Validation happens before the embedding request and the embedding is
    /// checked before anything is stored, so a failed call leaves both tiers
    /// unchanged.
    pub async fn add(
        &mut self,
        agent_id: &str,
        text: &str,
        weight: f32,
        memory_type: MemoryType,
        turn: u64,
    ) -> Result<&MemoryItem> {
        validate_input(text, weight)?;
        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(ServiceError::Embedding)?;
        self.insert(agent_id, text, embedding, weight, memory_type, turn)
    }

    /// Store a memory whose embedding is already known.
    pub fn add_with_embedding(
        &mut self,
        agent_id: &str,
        text: &str,
        embedding: Vec<f32>,
        weight: f32,
        memory_type: MemoryType,
        turn: u64,
    ) -> Result<&MemoryItem> {
        validate_input(text, weight)?;
        self.insert(agent_id, text, embedding, weight, memory_type, turn)
    }

    fn insert(
        &mut self,
        agent_id: &str,
        text: &str,
        embedding: Vec<f32>,
        weight: f32,
        memory_type: MemoryType,
        turn: u64,
    ) -> Result<&MemoryItem> {
        validate_embedding(&embedding, self.dimensions)?;
        self.dimensions.get_or_insert(embedding.len());

        let item = MemoryItem::new(
            self.ids.next_id(IdKind::Memory),
            agent_id,
            text,
            embedding,
            weight,
            memory_type,
            turn,
        );
        debug!(
            memory_id = %item.id,
            agent_id,
            memory_type = %memory_type,
            turn,
            "Stored memory"
        );

        let tier = match memory_type {
            MemoryType::Working => &mut self.working,
            MemoryType::LongTerm => &mut self.long_term,
        };
        let index = tier.len();
        tier.push(item);
        Ok(&tier[index])
    }

    pub fn working(&self) -> &[MemoryItem] {
        &self.working
    }

    pub fn long_term(&self) -> &[MemoryItem] {
        &self.long_term
    }

    /// Total number of items across both tiers.
    pub fn len(&self) -> usize {
        self.working.len() + self.long_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<&MemoryItem> {
        self.iter().find(|m| m.id == id)
    }

    /// Long-term items first, then working items, each in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryItem> {
        self.long_term.iter().chain(self.working.iter())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut MemoryItem> {
        self.long_term.iter_mut().chain(self.working.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use thoughtful_llm::MockEmbedder;
    use thoughtful_types::SequentialIds;

    use super::*;
    use crate::splitter::TextSplitter;
    use crate::testing::FailingEmbedder;

    fn store() -> MemoryStore {
        MemoryStore::new(
            Arc::new(MockEmbedder::new(16)),
            SequentialIds::shared(),
            SaliencyConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_add_initializes_bookkeeping() {
        let mut store = store();
        let item = store
            .add("agent-1", "I like tea.", 0.7, MemoryType::Working, 4)
            .await
            .unwrap();

        assert_eq!(item.id, "memory-00000000-0000-0000-0000-000000000001");
        assert_eq!(item.agent_id, "agent-1");
        assert_eq!(item.saliency(), 1.0);
        assert_eq!(item.last_accessed_turn(), 4);
        assert_eq!(item.retrieval_count(), 0);
        assert_eq!(item.embedding().len(), 16);
        assert_eq!(store.working().len(), 1);
        assert!(store.long_term().is_empty());
        assert_eq!(store.dimensions(), Some(16));
    }

    #[tokio::test]
    async fn test_persona_split_yields_long_term_memories() {
        let mut store = store();
        for chunk in TextSplitter::new().split("Hello world. This is a test.") {
            store
                .add("agent-1", &chunk, 1.0, MemoryType::LongTerm, 0)
                .await
                .unwrap();
        }

        assert_eq!(store.long_term().len(), 2);
        assert!(store.working().is_empty());
        for item in store.long_term() {
            assert_eq!(item.turn_number, 0);
            assert_eq!(item.weight, 1.0);
            assert!(!item.embedding().is_empty());
            assert_eq!(item.memory_type.as_str(), "long_term");
        }
    }

    #[tokio::test]
    async fn test_add_empty_text_leaves_store_unchanged() {
        let mut store = store();
        store
            .add("agent-1", "Existing.", 1.0, MemoryType::LongTerm, 0)
            .await
            .unwrap();
        let (working, long_term) = (store.working().len(), store.long_term().len());

        let err = store
            .add("agent-1", "", 1.0, MemoryType::Working, 1)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.working().len(), working);
        assert_eq!(store.long_term().len(), long_term);
    }

    #[tokio::test]
    async fn test_add_rejects_negative_weight() {
        let mut store = store();
        let err = store
            .add("agent-1", "text", -1.0, MemoryType::Working, 0)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_nothing() {
        let mut store = MemoryStore::new(
            Arc::new(FailingEmbedder),
            SequentialIds::shared(),
            SaliencyConfig::default(),
        );
        let err = store
            .add("agent-1", "Something.", 1.0, MemoryType::LongTerm, 0)
            .await
            .unwrap_err();

        assert!(err.is_service());
        assert!(err.to_string().contains("embedding failed"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_with_embedding_checks_dimensions() {
        let mut store = store();
        store
            .add_with_embedding("agent-1", "a", vec![1.0, 0.0], 1.0, MemoryType::Working, 1)
            .unwrap();
        let err = store
            .add_with_embedding("agent-1", "b", vec![1.0, 0.0, 0.0], 1.0, MemoryType::Working, 1)
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_and_iter() {
        let mut store = store();
        let id = store
            .add_with_embedding("agent-1", "w", vec![1.0, 0.0], 1.0, MemoryType::Working, 1)
            .unwrap()
            .id
            .clone();
        store
            .add_with_embedding("agent-1", "l", vec![0.0, 1.0], 1.0, MemoryType::LongTerm, 0)
            .unwrap();

        assert_eq!(store.get(&id).unwrap().text, "w");
        assert!(store.get("memory-missing").is_none());
        let texts: Vec<_> = store.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["l", "w"]);
    }
}
