//! Test utilities and mock types for Alembic development.
//!
//! Provides [`CounterEnvironment`], a minimal [`Environment`] made of named
//! integer counters plus an optional node graph, and a set of reaction
//! fixtures in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    FailingReaction, FixedIntervalReaction, NeverReaction, PanickingReaction,
    RandomDelayReaction, SpyReaction, TimeTravelReaction,
};

use alembic_core::{Element, Environment, EnvironmentChange, NodeId};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

/// Element for counter `key`.
pub fn counter(key: u32) -> Element {
    Element::global(key)
}

/// Mock [`Environment`]: global integer counters and an undirected graph.
///
/// Counters default to zero. Structural edits are queued as
/// [`EnvironmentChange`]s exactly as a real environment would report them.
#[derive(Debug, Default)]
pub struct CounterEnvironment {
    counters: IndexMap<u32, i64>,
    nodes: IndexSet<NodeId>,
    edges: IndexMap<NodeId, SmallVec<[NodeId; 8]>>,
    changes: Vec<EnvironmentChange>,
}

impl CounterEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment with nodes `0..count` and no edges.
    pub fn with_nodes(count: u32) -> Self {
        let mut env = Self::new();
        for n in 0..count {
            env.nodes.insert(NodeId(n));
        }
        env
    }

    pub fn counter(&self, key: u32) -> i64 {
        self.counters.get(&key).copied().unwrap_or(0)
    }

    pub fn set_counter(&mut self, key: u32, value: i64) {
        self.counters.insert(key, value);
    }

    pub fn increment(&mut self, key: u32, by: i64) {
        *self.counters.entry(key).or_insert(0) += by;
    }

    pub fn add_node(&mut self, node: NodeId) {
        self.nodes.insert(node);
    }

    /// Remove a node and its edges, reporting the change.
    pub fn remove_node(&mut self, node: NodeId) {
        if !self.nodes.swap_remove(&node) {
            return;
        }
        if let Some(neighbours) = self.edges.swap_remove(&node) {
            for other in neighbours {
                if let Some(list) = self.edges.get_mut(&other) {
                    list.retain(|n| *n != node);
                }
                self.changes
                    .push(EnvironmentChange::NeighbourhoodChanged(other));
            }
        }
        self.changes.push(EnvironmentChange::NodeRemoved(node));
    }

    /// Link two nodes, reporting a neighbourhood change on both ends.
    pub fn connect(&mut self, a: NodeId, b: NodeId) {
        for (from, to) in [(a, b), (b, a)] {
            let list = self.edges.entry(from).or_default();
            if !list.contains(&to) {
                list.push(to);
                list.sort_unstable();
            }
            self.changes
                .push(EnvironmentChange::NeighbourhoodChanged(from));
        }
    }

    /// Queue an arbitrary change notification.
    pub fn push_change(&mut self, change: EnvironmentChange) {
        self.changes.push(change);
    }

    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }
}

impl Environment for CounterEnvironment {
    fn neighbours(&self, node: NodeId) -> SmallVec<[NodeId; 8]> {
        self.edges.get(&node).cloned().unwrap_or_default()
    }

    fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    fn drain_changes(&mut self) -> Vec<EnvironmentChange> {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_default_to_zero() {
        let mut env = CounterEnvironment::new();
        assert_eq!(env.counter(3), 0);
        env.increment(3, 2);
        env.increment(3, 2);
        assert_eq!(env.counter(3), 4);
        env.set_counter(3, -1);
        assert_eq!(env.counter(3), -1);
    }

    #[test]
    fn structural_edits_are_reported() {
        let mut env = CounterEnvironment::with_nodes(3);
        env.connect(NodeId(0), NodeId(1));
        assert_eq!(env.neighbours(NodeId(0)).as_slice(), &[NodeId(1)]);
        assert_eq!(
            env.drain_changes(),
            vec![
                EnvironmentChange::NeighbourhoodChanged(NodeId(0)),
                EnvironmentChange::NeighbourhoodChanged(NodeId(1)),
            ]
        );

        env.remove_node(NodeId(1));
        assert!(!env.contains_node(NodeId(1)));
        assert!(env.neighbours(NodeId(0)).is_empty());
        assert_eq!(
            env.drain_changes(),
            vec![
                EnvironmentChange::NeighbourhoodChanged(NodeId(0)),
                EnvironmentChange::NodeRemoved(NodeId(1)),
            ]
        );
        assert_eq!(env.pending_changes(), 0);
    }
}
