//! Append-only storage for an engine's reactions.
//!
//! Slots are never reused, so a [`ReactionId`] handed out once can only
//! ever refer to that reaction or to nothing. A removed reaction leaves an
//! empty slot behind: memory grows with the number of ids ever issued,
//! not with the number of live reactions.

use alembic_core::{Environment, NodeId, Reaction, ReactionId};
use indexmap::IndexMap;
use smallvec::SmallVec;

pub(crate) struct ReactionArena<E: Environment> {
    slots: Vec<Option<Box<dyn Reaction<E>>>>,
    by_node: IndexMap<NodeId, SmallVec<[ReactionId; 4]>>,
    live: usize,
}

impl<E: Environment> ReactionArena<E> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            by_node: IndexMap::new(),
            live: 0,
        }
    }

    /// Store a reaction under the next id. `None` once ids are exhausted.
    pub fn insert(&mut self, reaction: Box<dyn Reaction<E>>) -> Option<ReactionId> {
        let id = ReactionId(u32::try_from(self.slots.len()).ok()?);
        if let Some(node) = reaction.node() {
            self.by_node.entry(node).or_default().push(id);
        }
        self.slots.push(Some(reaction));
        self.live += 1;
        Some(id)
    }

    pub fn remove(&mut self, id: ReactionId) -> Option<Box<dyn Reaction<E>>> {
        let reaction = self.slots.get_mut(id.index())?.take()?;
        self.live -= 1;
        if let Some(node) = reaction.node() {
            if let Some(ids) = self.by_node.get_mut(&node) {
                ids.retain(|r| *r != id);
                if ids.is_empty() {
                    self.by_node.swap_remove(&node);
                }
            }
        }
        Some(reaction)
    }

    pub fn get(&self, id: ReactionId) -> Option<&(dyn Reaction<E> + 'static)> {
        self.slots.get(id.index())?.as_deref()
    }

    pub fn get_mut(&mut self, id: ReactionId) -> Option<&mut (dyn Reaction<E> + 'static)> {
        self.slots.get_mut(id.index())?.as_deref_mut()
    }

    /// Reactions attached to `node`, in insertion order.
    pub fn on_node(&self, node: NodeId) -> &[ReactionId] {
        self.by_node.get(&node).map_or(&[], |ids| ids.as_slice())
    }

    pub fn len(&self) -> usize {
        self.live
    }

    /// Live reaction ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = ReactionId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| ReactionId(i as u32))
    }

    pub fn name(&self, id: ReactionId) -> String {
        self.get(id)
            .map(|r| r.name().to_owned())
            .unwrap_or_else(|| format!("<removed {id}>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alembic_test_utils::{CounterEnvironment, FixedIntervalReaction};

    fn on(node: u32) -> Box<dyn Reaction<CounterEnvironment>> {
        Box::new(FixedIntervalReaction::new("tick", 1.0).on_node(NodeId(node)))
    }

    #[test]
    fn ids_are_sequential_and_never_reused() {
        let mut arena = ReactionArena::with_capacity(4);
        let a = arena.insert(on(0)).unwrap();
        let b = arena.insert(on(0)).unwrap();
        assert_eq!((a, b), (ReactionId(0), ReactionId(1)));

        assert!(arena.remove(a).is_some());
        assert!(arena.remove(a).is_none());
        let c = arena.insert(on(1)).unwrap();
        assert_eq!(c, ReactionId(2));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.ids().collect::<Vec<_>>(), vec![b, c]);
    }

    #[test]
    fn node_index_tracks_membership() {
        let mut arena = ReactionArena::with_capacity(4);
        let a = arena.insert(on(3)).unwrap();
        let b = arena.insert(on(3)).unwrap();
        assert_eq!(arena.on_node(NodeId(3)), &[a, b]);

        arena.remove(a);
        assert_eq!(arena.on_node(NodeId(3)), &[b]);
        arena.remove(b);
        assert!(arena.on_node(NodeId(3)).is_empty());
        assert!(arena.get(b).is_none());
        assert_eq!(arena.name(b), "<removed r1>");
    }
}
