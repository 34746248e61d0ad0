//! Bounded per-agent thought storage.

use std::cmp::Ordering;

use tracing::debug;

use crate::types::ThoughtConfig;

use super::{Thought, ThoughtStatus};

/// Capacity-bounded collection of one agent's live thoughts.
///
/// Only evaluated thoughts are stored; generation and evaluation produce
/// thoughts without touching the reservoir, and [`add`](Self::add) commits
/// them afterwards.
#[derive(Debug, Clone)]
pub struct ThoughtReservoir {
    agent_id: String,
    config: ThoughtConfig,
    thoughts: Vec<Thought>,
}

impl ThoughtReservoir {
    pub fn new(agent_id: impl Into<String>, config: ThoughtConfig) -> Self {
        Self {
            agent_id: agent_id.into(),
            config,
            thoughts: Vec::new(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn config(&self) -> &ThoughtConfig {
        &self.config
    }

    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    pub fn len(&self) -> usize {
        self.thoughts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thoughts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Thought> {
        self.thoughts.iter().find(|t| t.id == id)
    }

    pub fn queued(&self) -> impl Iterator<Item = &Thought> {
        self.thoughts.iter().filter(|t| t.is_queued())
    }

    /// Highest-scored queued thought; ties go to the older one.
    pub fn best_queued(&self) -> Option<&Thought> {
        self.queued().max_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.turn_created.cmp(&a.turn_created))
                .then_with(|| b.id.cmp(&a.id))
        })
    }

    /// Insert evaluated thoughts, returning any evicted to stay within capacity.
    ///
    /// Discarded thoughts are dropped rather than stored. Eviction removes the
    /// lowest-scored thought, preferring ones not queued to speak; ties go to
    /// the oldest.
    pub fn add(&mut self, thoughts: impl IntoIterator<Item = Thought>) -> Vec<Thought> {
        let mut evicted = Vec::new();
        for thought in thoughts {
            if thought.status == ThoughtStatus::Discarded {
                continue;
            }
            self.thoughts.push(thought);
            while self.thoughts.len() > self.config.capacity {
                let Some(index) = self.eviction_candidate() else {
                    break;
                };
                let mut victim = self.thoughts.remove(index);
                victim.status = ThoughtStatus::Discarded;
                debug!(
                    agent_id = %self.agent_id,
                    thought_id = %victim.id,
                    score = victim.score,
                    "Evicted thought at capacity"
                );
                evicted.push(victim);
            }
        }
        evicted
    }

    fn eviction_candidate(&self) -> Option<usize> {
        self.thoughts
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.is_queued()
                    .cmp(&b.is_queued())
                    .then_with(|| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))
                    .then_with(|| a.turn_created.cmp(&b.turn_created))
            })
            .map(|(index, _)| index)
    }

    /// Remove a thought that has been spoken, returning it as expressed.
    pub fn mark_expressed(&mut self, id: &str) -> Option<Thought> {
        let index = self.thoughts.iter().position(|t| t.id == id)?;
        let mut thought = self.thoughts.remove(index);
        thought.status = ThoughtStatus::Expressed;
        Some(thought)
    }

    /// Age every stored thought to `turn`, returning the ones dropped.
    ///
    /// Scores decay per elapsed turn; thoughts past the horizon or under the
    /// floor are discarded and removed.
    pub fn decay(&mut self, turn: u64) -> Vec<Thought> {
        let ThoughtConfig {
            decay_factor,
            floor,
            horizon,
            ..
        } = self.config;

        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.thoughts.len());
        for mut thought in self.thoughts.drain(..) {
            thought.decay_to(turn, decay_factor);
            if thought.age(turn) > horizon || thought.score < floor {
                thought.status = ThoughtStatus::Discarded;
                removed.push(thought);
            } else {
                kept.push(thought);
            }
        }
        self.thoughts = kept;

        if !removed.is_empty() {
            debug!(
                agent_id = %self.agent_id,
                turn,
                removed = removed.len(),
                remaining = self.thoughts.len(),
                "Decayed thoughts"
            );
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thought::ThoughtKind;

    fn thought(id: &str, score: f32, turn: u64, queued: bool) -> Thought {
        let mut t = Thought::new(
            id.to_string(),
            "agent-1",
            format!("content of {id}"),
            vec![1.0],
            "utterance-1",
            ThoughtKind::Reactive,
            turn,
        );
        let threshold = if queued { 0.0 } else { 1.1 };
        t.apply_evaluation("", score, threshold);
        if !queued {
            // Keep a stored, non-queued thought for eviction tests.
            t.status = ThoughtStatus::Evaluated;
        }
        t
    }

    fn reservoir(capacity: usize) -> ThoughtReservoir {
        ThoughtReservoir::new(
            "agent-1",
            ThoughtConfig::default()
                .with_capacity(capacity)
                .with_decay(0.5, 0.1, 3),
        )
    }

    #[test]
    fn test_add_skips_discarded() {
        let mut r = reservoir(4);
        let mut discarded = thought("t1", 0.2, 1, true);
        discarded.status = ThoughtStatus::Discarded;
        let evicted = r.add([discarded, thought("t2", 0.6, 1, true)]);
        assert!(evicted.is_empty());
        assert_eq!(r.len(), 1);
        assert!(r.get("t2").is_some());
    }

    #[test]
    fn test_capacity_evicts_lowest_score() {
        let mut r = reservoir(2);
        r.add([thought("a", 0.9, 1, true), thought("b", 0.6, 1, true)]);
        let evicted = r.add([thought("c", 0.7, 2, true)]);

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, "b");
        assert_eq!(evicted[0].status, ThoughtStatus::Discarded);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_capacity_prefers_evicting_non_queued() {
        let mut r = reservoir(2);
        r.add([thought("queued", 0.55, 1, true), thought("idle", 0.9, 1, false)]);
        let evicted = r.add([thought("new", 0.6, 2, true)]);
        assert_eq!(evicted[0].id, "idle");
    }

    #[test]
    fn test_capacity_tie_evicts_oldest() {
        let mut r = reservoir(2);
        r.add([thought("old", 0.6, 1, true), thought("mid", 0.6, 2, true)]);
        let evicted = r.add([thought("new", 0.6, 3, true)]);
        assert_eq!(evicted[0].id, "old");
    }

    #[test]
    fn test_best_queued() {
        let mut r = reservoir(4);
        assert!(r.best_queued().is_none());
        r.add([
            thought("low", 0.55, 1, true),
            thought("high", 0.8, 1, true),
            thought("hidden", 0.95, 1, false),
        ]);
        assert_eq!(r.best_queued().unwrap().id, "high");
    }

    #[test]
    fn test_mark_expressed_removes() {
        let mut r = reservoir(4);
        r.add([thought("a", 0.8, 1, true)]);
        let expressed = r.mark_expressed("a").unwrap();
        assert_eq!(expressed.status, ThoughtStatus::Expressed);
        assert!(r.is_empty());
        assert!(r.mark_expressed("a").is_none());
    }

    #[test]
    fn test_decay_floor_and_horizon() {
        let mut r = reservoir(8);
        r.add([thought("strong", 0.9, 1, true), thought("weak", 0.3, 1, true)]);

        // 0.3 * 0.5^2 = 0.075 < floor.
        let removed = r.decay(3);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, "weak");
        assert!((r.get("strong").unwrap().score - 0.225).abs() < 1e-6);

        // Idempotent for the same turn.
        assert!(r.decay(3).is_empty());
        assert!((r.get("strong").unwrap().score - 0.225).abs() < 1e-6);

        // Age 4 > horizon 3.
        let removed = r.decay(5);
        assert_eq!(removed.len(), 1);
        assert!(r.is_empty());
    }
}
