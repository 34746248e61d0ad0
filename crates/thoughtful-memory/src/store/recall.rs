//! Composite-score ranking and retrieval bookkeeping.

use std::cmp::Ordering;
use std::collections::HashSet;

use thoughtful_llm::cosine_similarity;
use tracing::debug;

use crate::types::{MemoryItem, RecallMatch};

use super::MemoryStore;

impl MemoryStore {
    /// Composite score of one item against `query` at `turn`.
    ///
    /// Returns `(score, similarity)`.
    pub fn score(&self, item: &MemoryItem, query: &[f32], turn: u64) -> (f32, f32) {
        let c = &self.config;
        let similarity = cosine_similarity(item.embedding(), query);
        let age = turn.saturating_sub(item.last_accessed_turn()).min(i32::MAX as u64) as i32;
        let recency = c.recency_decay.powi(age);
        let frequency = (1.0 + item.retrieval_count() as f32).ln();

        let score = c.relevance_weight * similarity
            + c.importance_weight * item.weight
            + c.recency_weight * recency
            + c.frequency_weight * frequency;
        (score, similarity)
    }

    /// Rank every stored item against `query` and return the top `k`.
    ///
    /// Sorted by descending score; ties go to the item accessed longer ago,
    /// then to the smaller id. Does not mutate the store.
    pub fn rank(&self, query: &[f32], turn: u64, k: usize) -> Vec<RecallMatch> {
        self.rank_where(query, turn, k, |_| true)
    }

    /// [`rank`](Self::rank) over the items `keep` accepts.
    pub fn rank_where<F>(&self, query: &[f32], turn: u64, k: usize, keep: F) -> Vec<RecallMatch>
    where
        F: Fn(&MemoryItem) -> bool,
    {
        let mut scored: Vec<(f32, f32, &MemoryItem)> = self
            .iter()
            .filter(|item| keep(item))
            .map(|item| {
                let (score, similarity) = self.score(item, query, turn);
                (score, similarity, item)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.2.last_accessed_turn().cmp(&b.2.last_accessed_turn()))
                .then_with(|| a.2.id.cmp(&b.2.id))
        });

        scored
            .into_iter()
            .take(k)
            .map(|(score, similarity, item)| RecallMatch {
                memory: item.clone(),
                score,
                similarity,
            })
            .collect()
    }

    /// Commit the bookkeeping for a ranking produced at `turn`.
    ///
    /// Selected items are refreshed toward full saliency and their access
    /// counters bumped; every other item decays for the turns elapsed since
    /// it last decayed. Embeddings are never touched.
    pub fn apply_retrieval(&mut self, selected: &[RecallMatch], turn: u64) {
        let ids: HashSet<&str> = selected.iter().map(|m| m.memory.id.as_str()).collect();
        let refresh_rate = self.config.refresh_rate;
        let decay_factor = self.config.decay_factor;

        let mut refreshed = 0usize;
        for item in self.iter_mut() {
            if ids.contains(item.id.as_str()) {
                item.touch(turn, refresh_rate);
                refreshed += 1;
            } else {
                item.decay_to(turn, decay_factor);
            }
        }
        debug!(turn, refreshed, total = self.len(), "Applied retrieval");
    }

    /// Rank, then commit the retrieval bookkeeping.
    ///
    /// Returns at most `k` items; with `k` larger than the store every item
    /// is returned exactly once.
    pub fn retrieve(&mut self, query: &[f32], turn: u64, k: usize) -> Vec<RecallMatch> {
        let matches = self.rank(query, turn, k);
        self.apply_retrieval(&matches, turn);
        matches
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use thoughtful_types::SequentialIds;

    use crate::config::SaliencyConfig;
    use crate::store::MemoryStore;
    use crate::testing::KeyedEmbedder;
    use crate::types::MemoryType;

    fn store_with(config: SaliencyConfig) -> MemoryStore {
        MemoryStore::new(
            Arc::new(KeyedEmbedder::new(3)),
            SequentialIds::shared(),
            config,
        )
    }

    fn seeded() -> MemoryStore {
        let mut store = store_with(SaliencyConfig::default());
        let rows = [
            ("cats", vec![1.0, 0.0, 0.0], MemoryType::LongTerm),
            ("dogs", vec![0.8, 0.6, 0.0], MemoryType::LongTerm),
            ("rain", vec![0.0, 1.0, 0.0], MemoryType::Working),
            ("tax", vec![0.0, 0.0, 1.0], MemoryType::Working),
        ];
        for (text, embedding, memory_type) in rows {
            store
                .add_with_embedding("agent-1", text, embedding, 1.0, memory_type, 0)
                .unwrap();
        }
        store
    }

    #[test]
    fn test_rank_where_skips_rejected_items() {
        let store = seeded();
        let matches = store.rank_where(&[1.0, 0.0, 0.0], 1, 2, |item| item.text != "cats");

        let texts: Vec<&str> = matches.iter().map(|m| m.memory.text.as_str()).collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], "dogs");
        assert!(!texts.contains(&"cats"));
    }

    #[test]
    fn test_rank_is_sorted_and_bounded() {
        let store = seeded();
        let matches = store.rank(&[1.0, 0.0, 0.0], 1, 2);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].memory.text, "cats");
        assert_eq!(matches[1].memory.text, "dogs");
        assert!(matches[0].score >= matches[1].score);
        assert!((matches[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_does_not_mutate() {
        let store = seeded();
        let before: Vec<_> = store.iter().cloned().collect();
        let _ = store.rank(&[1.0, 0.0, 0.0], 7, 3);
        let after: Vec<_> = store.iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_retrieve_large_k_returns_all_once() {
        let mut store = seeded();
        let matches = store.retrieve(&[0.0, 1.0, 0.0], 1, 100);

        assert_eq!(matches.len(), store.len());
        let mut ids: Vec<_> = matches.iter().map(|m| m.memory.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), store.len());
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_retrieve_zero_k() {
        let mut store = seeded();
        assert!(store.retrieve(&[1.0, 0.0, 0.0], 1, 0).is_empty());
    }

    #[test]
    fn test_retrieve_updates_bookkeeping() {
        let mut store = seeded();
        let matches = store.retrieve(&[1.0, 0.0, 0.0], 3, 1);
        let hit = &matches[0].memory.id;

        for item in store.iter() {
            assert!(item.saliency() >= 0.0);
            if &item.id == hit {
                assert_eq!(item.last_accessed_turn(), 3);
                assert_eq!(item.retrieval_count(), 1);
                assert_eq!(item.saliency(), 1.0);
            } else {
                assert_eq!(item.last_accessed_turn(), 0);
                assert_eq!(item.retrieval_count(), 0);
                assert!(item.saliency() < 1.0);
            }
        }
    }

    #[test]
    fn test_non_retrieved_strictly_decreases() {
        let mut store = seeded();
        let before: Vec<f32> = store.iter().map(|m| m.saliency()).collect();
        store.retrieve(&[0.0, 0.0, 1.0], 1, 1);
        store.retrieve(&[0.0, 0.0, 1.0], 2, 1);

        for (item, prior) in store.iter().zip(before) {
            if item.text != "tax" {
                assert!(item.saliency() < prior, "{} did not decay", item.text);
            }
        }
    }

    #[test]
    fn test_retrieved_saliency_moves_toward_one() {
        let mut store = seeded();
        store.decay(4);
        let before = store.iter().find(|m| m.text == "rain").unwrap().saliency();

        store.retrieve(&[0.0, 1.0, 0.0], 4, 1);
        let after = store.iter().find(|m| m.text == "rain").unwrap().saliency();

        assert!(after >= before);
        assert!((after - (before + (1.0 - before) * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_embeddings_are_never_mutated() {
        let mut store = seeded();
        let before: Vec<Vec<f32>> = store.iter().map(|m| m.embedding().to_vec()).collect();
        store.retrieve(&[0.3, 0.3, 0.3], 5, 2);
        let after: Vec<Vec<f32>> = store.iter().map(|m| m.embedding().to_vec()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_ties_prefer_older_access_then_id() {
        let mut store = store_with(SaliencyConfig::default().with_weights(1.0, 0.0, 0.0, 0.0));
        store
            .add_with_embedding("agent-1", "first", vec![1.0, 0.0, 0.0], 1.0, MemoryType::Working, 2)
            .unwrap();
        store
            .add_with_embedding("agent-1", "second", vec![1.0, 0.0, 0.0], 1.0, MemoryType::Working, 1)
            .unwrap();
        store
            .add_with_embedding("agent-1", "third", vec![1.0, 0.0, 0.0], 1.0, MemoryType::Working, 1)
            .unwrap();

        let order: Vec<_> = store
            .rank(&[1.0, 0.0, 0.0], 3, 3)
            .into_iter()
            .map(|m| m.memory.text)
            .collect();
        assert_eq!(order, vec!["second", "third", "first"]);
    }

    #[test]
    fn test_frequency_term_rewards_past_retrievals() {
        let mut store = store_with(SaliencyConfig::default().with_weights(0.0, 0.0, 0.0, 1.0));
        store
            .add_with_embedding("agent-1", "a", vec![1.0, 0.0, 0.0], 1.0, MemoryType::Working, 0)
            .unwrap();
        store
            .add_with_embedding("agent-1", "b", vec![0.0, 1.0, 0.0], 1.0, MemoryType::Working, 0)
            .unwrap();

        let top = store.retrieve(&[0.0, 1.0, 0.0], 1, 1);
        // All scores are zero, so the tie-break picks "a" (smaller id).
        assert_eq!(top[0].memory.text, "a");
        let next = store.rank(&[0.0, 1.0, 0.0], 2, 1);
        assert_eq!(next[0].memory.text, "a");
        assert!((next[0].score - 2.0f32.ln()).abs() < 1e-6);
    }
}
