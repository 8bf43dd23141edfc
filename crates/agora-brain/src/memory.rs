//! Bounded two-channel memory held by every brain.
//!
//! The action channel records what the agent decided; the observation
//! channel records what it saw (and heard) when deciding. Both are FIFO
//! rings: appending past capacity evicts the oldest item.

use std::collections::VecDeque;

use agora_types::{
    ActionMemoryItem, ConversationEntry, Decision, ObservationMemoryItem, SensorySnapshot,
};
use chrono::Utc;

/// Per-agent dual-queue memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    capacity: usize,
    actions: VecDeque<ActionMemoryItem>,
    observations: VecDeque<ObservationMemoryItem>,
}

impl MemoryStore {
    /// Create an empty store holding at most `capacity` items per channel.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            actions: VecDeque::with_capacity(capacity),
            observations: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a decision made at `simulation_time`.
    pub fn add_action(&mut self, decision: Decision, simulation_time: f64) {
        push_bounded(
            &mut self.actions,
            self.capacity,
            ActionMemoryItem {
                decision,
                simulation_time,
                timestamp: Utc::now(),
            },
        );
    }

    /// Record the snapshot a cycle reasoned over and the messages it heard.
    pub fn add_observation(&mut self, snapshot: SensorySnapshot, heard: Vec<ConversationEntry>) {
        push_bounded(
            &mut self.observations,
            self.capacity,
            ObservationMemoryItem { snapshot, heard },
        );
    }

    /// Remembered decisions, oldest first.
    pub fn recent_actions(&self) -> impl ExactSizeIterator<Item = &ActionMemoryItem> {
        self.actions.iter()
    }

    /// Remembered observations, oldest first.
    pub fn recent_observations(&self) -> impl ExactSizeIterator<Item = &ObservationMemoryItem> {
        self.observations.iter()
    }

    /// Number of items in the action channel.
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Number of items in the observation channel.
    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    /// Maximum items per channel.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.actions.clear();
        self.observations.clear();
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, capacity: usize, item: T) {
    while queue.len() >= capacity {
        queue.pop_front();
    }
    queue.push_back(item);
}

#[cfg(test)]
mod tests {
    use agora_types::Position;

    use super::*;

    fn step(x: f64) -> Decision {
        Decision::Move {
            target: Position::new(x, 0.0),
        }
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut memory = MemoryStore::new(3);
        for i in 0..5_u8 {
            memory.add_action(step(f64::from(i)), f64::from(i));
        }
        assert_eq!(memory.action_count(), 3);
        let times: Vec<f64> = memory.recent_actions().map(|a| a.simulation_time).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn channels_are_independent() {
        let mut memory = MemoryStore::new(2);
        memory.add_action(Decision::Idle, 1.0);
        for t in 0..4_u8 {
            memory.add_observation(
                SensorySnapshot::at(Position::default(), f64::from(t)),
                Vec::new(),
            );
        }
        assert_eq!(memory.action_count(), 1);
        assert_eq!(memory.observation_count(), 2);
        let first = memory.recent_observations().next().map(ObservationMemoryItem::simulation_time);
        assert_eq!(first, Some(2.0));
    }

    #[test]
    fn duplicates_are_kept() {
        let mut memory = MemoryStore::new(10);
        memory.add_action(Decision::Idle, 1.0);
        memory.add_action(Decision::Idle, 1.0);
        assert_eq!(memory.action_count(), 2);
    }

    #[test]
    fn clear_empties_both_channels() {
        let mut memory = MemoryStore::new(4);
        memory.add_action(Decision::Observe, 0.0);
        memory.add_observation(SensorySnapshot::at(Position::default(), 0.0), Vec::new());
        memory.clear();
        assert_eq!(memory.action_count(), 0);
        assert_eq!(memory.observation_count(), 0);
        assert_eq!(memory.capacity(), 4);
    }

    #[test]
    fn zero_capacity_is_raised() {
        let mut memory = MemoryStore::new(0);
        memory.add_action(Decision::Idle, 0.0);
        memory.add_action(Decision::Observe, 1.0);
        assert_eq!(memory.action_count(), 1);
    }
}
