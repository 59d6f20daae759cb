//! Reaction dependency graph.
//!
//! An edge `A -> B` means firing `A` may change the putative time of `B`,
//! i.e. `A.influence.affects(B.influence)`. After `A` fires the engine
//! recomputes exactly `affected_by(A)`.
//!
//! The graph is maintained incrementally. Per-element indexes of who
//! touches and who writes each element let an insertion or removal
//! compute only the edges incident to one reaction, instead of comparing
//! every pair.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;

use alembic_core::{Element, ElementSet, InfluenceSet, ReactionId};
use indexmap::IndexMap;

/// Errors from dependency graph updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyError {
    /// The reaction is already in the graph.
    DuplicateReaction {
        /// The duplicate id.
        reaction: ReactionId,
    },
    /// The reaction is not in the graph.
    UnknownReaction {
        /// The missing id.
        reaction: ReactionId,
    },
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateReaction { reaction } => {
                write!(f, "reaction {reaction} is already in the dependency graph")
            }
            Self::UnknownReaction { reaction } => {
                write!(f, "reaction {reaction} is not in the dependency graph")
            }
        }
    }
}

impl Error for DependencyError {}

#[derive(Debug)]
struct Node {
    influence: InfluenceSet,
    touched: ElementSet,
    /// Reactions this one affects.
    outgoing: BTreeSet<ReactionId>,
    /// Reactions that affect this one.
    incoming: BTreeSet<ReactionId>,
}

/// Directed graph of "firing A may reschedule B" relations.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<ReactionId, Node>,
    /// Element -> reactions whose finite touched set contains it.
    touchers: IndexMap<Element, BTreeSet<ReactionId>>,
    /// Element -> reactions whose finite write set contains it.
    writers: IndexMap<Element, BTreeSet<ReactionId>>,
    /// Reactions touching every element.
    global_touchers: BTreeSet<ReactionId>,
    /// Reactions writing every element.
    global_writers: BTreeSet<ReactionId>,
    /// Reactions writing anything at all.
    any_writers: BTreeSet<ReactionId>,
}

impl DependencyGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reactions in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no reactions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` is in the graph.
    pub fn contains(&self, id: ReactionId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The influence set `id` was registered with.
    pub fn influence(&self, id: ReactionId) -> Option<&InfluenceSet> {
        self.nodes.get(&id).map(|n| &n.influence)
    }

    /// Reactions whose schedule may change when `id` fires, ascending.
    ///
    /// Includes `id` itself when it writes something it touches.
    pub fn affected_by(&self, id: ReactionId) -> Result<&BTreeSet<ReactionId>, DependencyError> {
        self.nodes
            .get(&id)
            .map(|n| &n.outgoing)
            .ok_or(DependencyError::UnknownReaction { reaction: id })
    }

    /// Reactions whose firing may change the schedule of `id`, ascending.
    pub fn depends_on(&self, id: ReactionId) -> Result<&BTreeSet<ReactionId>, DependencyError> {
        self.nodes
            .get(&id)
            .map(|n| &n.incoming)
            .ok_or(DependencyError::UnknownReaction { reaction: id })
    }

    /// All reaction ids in the graph, in no particular order.
    pub fn reactions(&self) -> impl Iterator<Item = ReactionId> + '_ {
        self.nodes.keys().copied()
    }

    /// Total number of edges, self-loops included.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.outgoing.len()).sum()
    }

    /// Register `id` with its influence set and connect it.
    pub fn add_reaction(
        &mut self,
        id: ReactionId,
        influence: InfluenceSet,
    ) -> Result<(), DependencyError> {
        if self.nodes.contains_key(&id) {
            return Err(DependencyError::DuplicateReaction { reaction: id });
        }
        let touched = influence.touched();
        self.index(id, &influence, &touched);

        let outgoing = self.outgoing_of(id, &influence);
        let incoming = self.incoming_of(&touched);

        for &b in outgoing.iter().filter(|&&b| b != id) {
            if let Some(node) = self.nodes.get_mut(&b) {
                node.incoming.insert(id);
            }
        }
        for &a in incoming.iter().filter(|&&a| a != id) {
            if let Some(node) = self.nodes.get_mut(&a) {
                node.outgoing.insert(id);
            }
        }
        self.nodes.insert(
            id,
            Node {
                influence,
                touched,
                outgoing,
                incoming,
            },
        );
        Ok(())
    }

    /// Disconnect and forget `id`, returning its influence set.
    pub fn remove_reaction(&mut self, id: ReactionId) -> Result<InfluenceSet, DependencyError> {
        let node = self
            .nodes
            .swap_remove(&id)
            .ok_or(DependencyError::UnknownReaction { reaction: id })?;
        self.unindex(id, &node.influence, &node.touched);
        for b in &node.outgoing {
            if let Some(other) = self.nodes.get_mut(b) {
                other.incoming.remove(&id);
            }
        }
        for a in &node.incoming {
            if let Some(other) = self.nodes.get_mut(a) {
                other.outgoing.remove(&id);
            }
        }
        Ok(node.influence)
    }

    /// Replace the influence set of `id`, recomputing only its edges.
    ///
    /// Returns whether the set actually changed.
    pub fn update_influence(
        &mut self,
        id: ReactionId,
        influence: InfluenceSet,
    ) -> Result<bool, DependencyError> {
        match self.nodes.get(&id) {
            None => Err(DependencyError::UnknownReaction { reaction: id }),
            Some(node) if node.influence == influence => Ok(false),
            Some(_) => {
                self.remove_reaction(id)?;
                self.add_reaction(id, influence)?;
                Ok(true)
            }
        }
    }

    /// Remove every reaction.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Must run after `id` is indexed and before it joins `nodes`.
    fn outgoing_of(&self, id: ReactionId, influence: &InfluenceSet) -> BTreeSet<ReactionId> {
        match &influence.writes {
            w if w.is_empty() => BTreeSet::new(),
            ElementSet::All => self
                .nodes
                .keys()
                .copied()
                .chain(std::iter::once(id))
                .collect(),
            writes => {
                let mut out = self.global_touchers.clone();
                for e in writes.iter() {
                    if let Some(set) = self.touchers.get(e) {
                        out.extend(set.iter().copied());
                    }
                }
                out
            }
        }
    }

    fn incoming_of(&self, touched: &ElementSet) -> BTreeSet<ReactionId> {
        match touched {
            ElementSet::All => self.any_writers.clone(),
            _ => {
                let mut inc = self.global_writers.clone();
                for e in touched.iter() {
                    if let Some(set) = self.writers.get(e) {
                        inc.extend(set.iter().copied());
                    }
                }
                inc
            }
        }
    }

    fn index(&mut self, id: ReactionId, influence: &InfluenceSet, touched: &ElementSet) {
        match touched {
            ElementSet::All => {
                self.global_touchers.insert(id);
            }
            _ => {
                for &e in touched.iter() {
                    self.touchers.entry(e).or_default().insert(id);
                }
            }
        }
        match &influence.writes {
            w if w.is_empty() => {}
            ElementSet::All => {
                self.global_writers.insert(id);
                self.any_writers.insert(id);
            }
            writes => {
                self.any_writers.insert(id);
                for &e in writes.iter() {
                    self.writers.entry(e).or_default().insert(id);
                }
            }
        }
    }

    fn unindex(&mut self, id: ReactionId, influence: &InfluenceSet, touched: &ElementSet) {
        self.global_touchers.remove(&id);
        self.global_writers.remove(&id);
        self.any_writers.remove(&id);
        for e in touched.iter() {
            remove_from(&mut self.touchers, e, id);
        }
        for e in influence.writes.iter() {
            remove_from(&mut self.writers, e, id);
        }
    }
}

fn remove_from(index: &mut IndexMap<Element, BTreeSet<ReactionId>>, e: &Element, id: ReactionId) {
    if let Some(set) = index.get_mut(e) {
        set.remove(&id);
        if set.is_empty() {
            index.swap_remove(e);
        }
    }
}
