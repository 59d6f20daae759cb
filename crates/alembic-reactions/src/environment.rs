//! A graph of nodes, each holding molecule concentrations.

use std::fmt;

use alembic_core::{Element, Environment, EnvironmentChange, NodeId};
use indexmap::IndexMap;
use smallvec::SmallVec;

/// Identity of a chemical species.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoleculeId(pub u32);

impl fmt::Display for MoleculeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

impl From<u32> for MoleculeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[derive(Debug, Default)]
struct NodeState {
    concentrations: IndexMap<MoleculeId, f64>,
    neighbours: SmallVec<[NodeId; 8]>,
}

/// Undirected graph of nodes with per-node concentrations.
///
/// Node ids are handed out in increasing order and never reused.
/// Neighbour lists are kept sorted so iteration order is deterministic.
/// Structural edits are recorded and reported through
/// [`Environment::drain_changes`].
#[derive(Debug, Default)]
pub struct GraphEnvironment {
    nodes: IndexMap<NodeId, NodeState>,
    next_node: u32,
    changes: Vec<EnvironmentChange>,
}

impl GraphEnvironment {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` nodes connected in a ring. Fewer than three nodes are
    /// connected as a line.
    pub fn ring(count: u32) -> Self {
        let mut env = Self::new();
        let nodes: Vec<NodeId> = (0..count).map(|_| env.add_node()).collect();
        for pair in nodes.windows(2) {
            env.connect(pair[0], pair[1]);
        }
        if count > 2 {
            env.connect(nodes[nodes.len() - 1], nodes[0]);
        }
        env.changes.clear();
        env
    }

    /// Add an isolated node and return its id.
    pub fn add_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, NodeState::default());
        id
    }

    /// Remove a node and its links. Returns whether it existed.
    pub fn remove_node(&mut self, node: NodeId) -> bool {
        let Some(state) = self.nodes.shift_remove(&node) else {
            return false;
        };
        for other in state.neighbours {
            if let Some(s) = self.nodes.get_mut(&other) {
                s.neighbours.retain(|n| *n != node);
            }
            self.changes.push(EnvironmentChange::NeighbourhoodChanged(other));
        }
        self.changes.push(EnvironmentChange::NodeRemoved(node));
        true
    }

    /// Link two distinct existing nodes. Returns whether a new link was made.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> bool {
        if a == b || !self.nodes.contains_key(&a) || !self.nodes.contains_key(&b) {
            return false;
        }
        if !self.link(a, b) {
            return false;
        }
        self.link(b, a);
        self.changes.push(EnvironmentChange::NeighbourhoodChanged(a));
        self.changes.push(EnvironmentChange::NeighbourhoodChanged(b));
        true
    }

    /// Unlink two nodes. Returns whether they were linked.
    pub fn disconnect(&mut self, a: NodeId, b: NodeId) -> bool {
        if !self.unlink(a, b) {
            return false;
        }
        self.unlink(b, a);
        self.changes.push(EnvironmentChange::NeighbourhoodChanged(a));
        self.changes.push(EnvironmentChange::NeighbourhoodChanged(b));
        true
    }

    fn link(&mut self, from: NodeId, to: NodeId) -> bool {
        let Some(state) = self.nodes.get_mut(&from) else {
            return false;
        };
        match state.neighbours.binary_search(&to) {
            Ok(_) => false,
            Err(pos) => {
                state.neighbours.insert(pos, to);
                true
            }
        }
    }

    fn unlink(&mut self, from: NodeId, to: NodeId) -> bool {
        let Some(state) = self.nodes.get_mut(&from) else {
            return false;
        };
        match state.neighbours.binary_search(&to) {
            Ok(pos) => {
                state.neighbours.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Concentration of `molecule` at `node`; zero when absent.
    pub fn concentration(&self, node: NodeId, molecule: MoleculeId) -> f64 {
        self.nodes
            .get(&node)
            .and_then(|s| s.concentrations.get(&molecule))
            .copied()
            .unwrap_or(0.0)
    }

    /// Set a concentration. Returns `false` if the node does not exist.
    pub fn set_concentration(&mut self, node: NodeId, molecule: MoleculeId, value: f64) -> bool {
        match self.nodes.get_mut(&node) {
            Some(state) => {
                state.concentrations.insert(molecule, value);
                true
            }
            None => false,
        }
    }

    /// The element a reaction reads or writes to access a concentration.
    pub fn element(node: NodeId, molecule: MoleculeId) -> Element {
        Element::node(node, molecule.0)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node ids in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Total amount of `molecule` over all nodes.
    pub fn total(&self, molecule: MoleculeId) -> f64 {
        self.nodes
            .values()
            .filter_map(|s| s.concentrations.get(&molecule))
            .sum()
    }
}

impl Environment for GraphEnvironment {
    fn neighbours(&self, node: NodeId) -> SmallVec<[NodeId; 8]> {
        self.nodes
            .get(&node)
            .map(|s| s.neighbours.clone())
            .unwrap_or_default()
    }

    fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn drain_changes(&mut self) -> Vec<EnvironmentChange> {
        std::mem::take(&mut self.changes)
    }
}
