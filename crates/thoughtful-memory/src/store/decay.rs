//! End-of-turn aging.

use tracing::debug;

use super::MemoryStore;

impl MemoryStore {
    /// Decay every item up to `turn`.
    ///
    /// Turn-indexed: an item that already decayed at `turn` is left alone, so
    /// calling this twice for the same turn changes nothing. Returns the
    /// number of items whose saliency changed.
    pub fn decay(&mut self, turn: u64) -> usize {
        let factor = self.config.decay_factor;
        let changed = self
            .iter_mut()
            .map(|item| item.decay_to(turn, factor))
            .filter(|changed| *changed)
            .count();
        debug!(turn, changed, "Decayed memories");
        changed
    }

    /// Remove stale working memories; long-term memories are never pruned.
    ///
    /// A working item is stale when its saliency is below `prune_floor` or it
    /// has not been accessed for more than `working_window` turns.
    pub fn prune(&mut self, turn: u64) -> usize {
        let floor = self.config.prune_floor;
        let window = self.config.working_window;
        let before = self.working.len();

        self.working.retain(|item| {
            let faded = item.saliency() < floor;
            let idle = window.is_some_and(|w| turn.saturating_sub(item.last_accessed_turn()) > w);
            !(faded || idle)
        });

        let removed = before - self.working.len();
        if removed > 0 {
            debug!(turn, removed, remaining = self.working.len(), "Pruned working memories");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use thoughtful_llm::MockEmbedder;
    use thoughtful_types::SequentialIds;

    use crate::config::SaliencyConfig;
    use crate::store::MemoryStore;
    use crate::types::MemoryType;

    fn store(config: SaliencyConfig) -> MemoryStore {
        let mut store = MemoryStore::new(
            Arc::new(MockEmbedder::new(4)),
            SequentialIds::shared(),
            config,
        );
        store
            .add_with_embedding("agent-1", "persona", vec![1.0, 0.0, 0.0, 0.0], 1.0, MemoryType::LongTerm, 0)
            .unwrap();
        store
            .add_with_embedding("agent-1", "chatter", vec![0.0, 1.0, 0.0, 0.0], 1.0, MemoryType::Working, 0)
            .unwrap();
        store
    }

    fn saliencies(store: &MemoryStore) -> Vec<f32> {
        store.iter().map(|m| m.saliency()).collect()
    }

    #[test]
    fn test_decay_is_idempotent_within_a_turn() {
        let mut store = store(SaliencyConfig::default());
        assert_eq!(store.decay(2), 2);
        let once = saliencies(&store);

        assert_eq!(store.decay(2), 0);
        assert_eq!(saliencies(&store), once);
    }

    #[test]
    fn test_decay_compounds_per_elapsed_turn() {
        let mut store = store(SaliencyConfig::default().with_decay_factor(0.5));
        store.decay(1);
        store.decay(3);
        for s in saliencies(&store) {
            assert!((s - 0.125).abs() < 1e-6);
            assert!(s >= 0.0);
        }
    }

    #[test]
    fn test_prune_removes_faded_working_only() {
        let mut store = store(SaliencyConfig::default().with_decay_factor(0.5).with_prune_floor(0.05));
        store.decay(5); // 0.5^5 = 0.03125

        assert_eq!(store.prune(5), 1);
        assert!(store.working().is_empty());
        assert_eq!(store.long_term().len(), 1);
        assert!(store.long_term()[0].saliency() < 0.05);
    }

    #[test]
    fn test_prune_removes_idle_working_items() {
        let config = SaliencyConfig::default()
            .with_decay_factor(0.99)
            .with_working_window(Some(3));
        let mut store = store(config);

        assert_eq!(store.prune(3), 0);
        assert_eq!(store.prune(4), 1);
        assert_eq!(store.long_term().len(), 1);
    }

    #[test]
    fn test_prune_without_window_keeps_salient_items() {
        let mut store = store(SaliencyConfig::default().with_working_window(None));
        assert_eq!(store.prune(1_000), 0);
        assert_eq!(store.len(), 2);
    }
}
