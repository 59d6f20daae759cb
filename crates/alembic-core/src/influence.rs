//! Influence sets: which environment elements a reaction reads and writes.
//!
//! Influence sets drive dependency computation only. They never decide
//! execution order. Declaring too much is always safe (extra recomputation);
//! declaring too little leaves stale schedules behind.

use smallvec::SmallVec;
use std::fmt;

use crate::id::NodeId;

/// A single piece of environment state a reaction can depend on.
///
/// `key` is chosen by the incarnation (a molecule, a sensor, a layer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    /// Environment-wide state not attached to a node.
    Global {
        /// Incarnation-defined key.
        key: u32,
    },
    /// State held by one node.
    Node {
        /// The owning node.
        node: NodeId,
        /// Incarnation-defined key.
        key: u32,
    },
}

impl Element {
    /// An environment-wide element.
    pub fn global(key: u32) -> Self {
        Self::Global { key }
    }

    /// A per-node element.
    pub fn node(node: NodeId, key: u32) -> Self {
        Self::Node { node, key }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global { key } => write!(f, "global:{key}"),
            Self::Node { node, key } => write!(f, "{node}:{key}"),
        }
    }
}

/// A set of [`Element`]s, or every element at once.
///
/// Finite sets are kept sorted and deduplicated so equality is structural.
/// An `Only` with no elements equals [`ElementSet::Empty`].
#[derive(Clone, Debug, Default)]
pub enum ElementSet {
    /// Every element, present and future.
    All,
    /// A finite set, sorted ascending without duplicates.
    Only(SmallVec<[Element; 4]>),
    /// No elements.
    #[default]
    Empty,
}

impl ElementSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::Empty
    }

    /// The set of every element.
    pub fn all() -> Self {
        Self::All
    }

    /// Whether the set contains nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Only(items) => items.is_empty(),
            Self::All => false,
        }
    }

    /// Whether the set covers every element.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Number of elements in a finite set. `None` for [`ElementSet::All`].
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::All => None,
            Self::Only(items) => Some(items.len()),
            Self::Empty => Some(0),
        }
    }

    /// Add an element.
    pub fn insert(&mut self, element: Element) {
        match self {
            Self::All => {}
            Self::Empty => *self = Self::Only(smallvec::smallvec![element]),
            Self::Only(items) => {
                if let Err(pos) = items.binary_search(&element) {
                    items.insert(pos, element);
                }
            }
        }
    }

    /// Whether `element` is in the set.
    pub fn contains(&self, element: &Element) -> bool {
        match self {
            Self::All => true,
            Self::Only(items) => items.binary_search(element).is_ok(),
            Self::Empty => false,
        }
    }

    /// `self ∪ other`.
    pub fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::All, _) | (_, Self::All) => Self::All,
            (Self::Empty, x) | (x, Self::Empty) => x.clone(),
            (Self::Only(a), Self::Only(b)) => {
                let mut merged: SmallVec<[Element; 4]> =
                    SmallVec::with_capacity(a.len() + b.len());
                let (mut i, mut j) = (0, 0);
                while i < a.len() && j < b.len() {
                    match a[i].cmp(&b[j]) {
                        std::cmp::Ordering::Less => {
                            merged.push(a[i]);
                            i += 1;
                        }
                        std::cmp::Ordering::Greater => {
                            merged.push(b[j]);
                            j += 1;
                        }
                        std::cmp::Ordering::Equal => {
                            merged.push(a[i]);
                            i += 1;
                            j += 1;
                        }
                    }
                }
                merged.extend_from_slice(&a[i..]);
                merged.extend_from_slice(&b[j..]);
                if merged.is_empty() {
                    Self::Empty
                } else {
                    Self::Only(merged)
                }
            }
        }
    }

    /// Whether the two sets share at least one element.
    ///
    /// `All` intersects every non-empty set.
    pub fn intersects(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        match (self, other) {
            (Self::All, _) | (_, Self::All) => true,
            (Self::Only(a), Self::Only(b)) => {
                let (mut i, mut j) = (0, 0);
                while i < a.len() && j < b.len() {
                    match a[i].cmp(&b[j]) {
                        std::cmp::Ordering::Less => i += 1,
                        std::cmp::Ordering::Greater => j += 1,
                        std::cmp::Ordering::Equal => return true,
                    }
                }
                false
            }
            _ => false,
        }
    }

    /// Iterate the elements of a finite set. Yields nothing for `All`.
    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        match self {
            Self::Only(items) => items.iter(),
            Self::All | Self::Empty => [].iter(),
        }
    }
}

impl PartialEq for ElementSet {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::All, Self::All) => true,
            (Self::All, _) | (_, Self::All) => false,
            _ => self.iter().eq(other.iter()),
        }
    }
}

impl Eq for ElementSet {}

impl FromIterator<Element> for ElementSet {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        let mut items: SmallVec<[Element; 4]> = iter.into_iter().collect();
        if items.is_empty() {
            return Self::Empty;
        }
        items.sort_unstable();
        items.dedup();
        Self::Only(items)
    }
}

/// Everything a reaction reads and writes.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct InfluenceSet {
    /// Elements the reaction's conditions and rate depend on.
    pub reads: ElementSet,
    /// Elements the reaction's effects may modify.
    pub writes: ElementSet,
}

impl InfluenceSet {
    /// Create an influence set.
    pub fn new(reads: ElementSet, writes: ElementSet) -> Self {
        Self { reads, writes }
    }

    /// An influence set that reads and writes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// An influence set that reads and writes everything.
    pub fn global() -> Self {
        Self::new(ElementSet::All, ElementSet::All)
    }

    /// `reads ∪ writes`.
    pub fn touched(&self) -> ElementSet {
        self.reads.union(&self.writes)
    }

    /// Whether firing a reaction with this set may invalidate the schedule
    /// of a reaction with `other`.
    ///
    /// - nothing written: never;
    /// - everything written: always;
    /// - `other` touches everything: whenever something is written;
    /// - otherwise: when `writes` meets `other.reads ∪ other.writes`.
    pub fn affects(&self, other: &InfluenceSet) -> bool {
        match &self.writes {
            w if w.is_empty() => false,
            ElementSet::All => true,
            writes => writes.intersects(&other.touched()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(node: u32, key: u32) -> Element {
        Element::node(NodeId(node), key)
    }

    #[test]
    fn from_iter_sorts_and_dedups() {
        let set: ElementSet = [n(2, 0), n(1, 0), n(2, 0)].into_iter().collect();
        assert_eq!(set.len(), Some(2));
        let items: Vec<_> = set.iter().copied().collect();
        assert_eq!(items, vec![n(1, 0), n(2, 0)]);
    }

    #[test]
    fn from_empty_iter_is_empty() {
        let set: ElementSet = std::iter::empty().collect();
        assert!(set.is_empty());
    }

    #[test]
    fn empty_only_equals_empty() {
        let hollow = ElementSet::Only(SmallVec::new());
        assert_eq!(hollow, ElementSet::empty());
        assert_eq!(hollow.union(&hollow), ElementSet::Empty);
        assert_ne!(hollow, ElementSet::all());
        assert_ne!(ElementSet::Only(smallvec::smallvec![n(0, 0)]), ElementSet::empty());

        let a = InfluenceSet::new(hollow.clone(), ElementSet::empty());
        assert_eq!(a, InfluenceSet::none());
    }

    #[test]
    fn insert_keeps_order() {
        let mut set = ElementSet::empty();
        set.insert(n(3, 1));
        set.insert(Element::global(7));
        set.insert(n(0, 1));
        set.insert(n(3, 1));
        let items: Vec<_> = set.iter().copied().collect();
        assert_eq!(items, vec![Element::global(7), n(0, 1), n(3, 1)]);
    }

    #[test]
    fn insert_into_all_is_noop() {
        let mut set = ElementSet::all();
        set.insert(n(0, 0));
        assert!(set.is_all());
    }

    #[test]
    fn union_and_intersects() {
        let a: ElementSet = [n(0, 0), n(1, 0)].into_iter().collect();
        let b: ElementSet = [n(1, 0), n(2, 0)].into_iter().collect();
        let c: ElementSet = [n(5, 5)].into_iter().collect();
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.union(&b).len(), Some(3));
        assert!(a.union(&ElementSet::All).is_all());
        assert_eq!(a.union(&ElementSet::Empty), a);
    }

    #[test]
    fn all_intersects_non_empty_only() {
        assert!(ElementSet::All.intersects(&ElementSet::All));
        assert!(!ElementSet::All.intersects(&ElementSet::Empty));
        let a: ElementSet = [n(0, 0)].into_iter().collect();
        assert!(ElementSet::All.intersects(&a));
    }

    #[test]
    fn affects_rules() {
        let x = n(0, 0);
        let writer = InfluenceSet::new(ElementSet::empty(), [x].into_iter().collect());
        let reader = InfluenceSet::new([x].into_iter().collect(), ElementSet::empty());
        let unrelated = InfluenceSet::new([n(9, 9)].into_iter().collect(), ElementSet::empty());
        let blind = InfluenceSet::none();

        assert!(writer.affects(&reader));
        assert!(writer.affects(&writer), "a writer affects itself");
        assert!(!writer.affects(&unrelated));
        assert!(!reader.affects(&writer), "readers write nothing");
        assert!(!writer.affects(&blind));

        let global_writer = InfluenceSet::new(ElementSet::empty(), ElementSet::All);
        assert!(global_writer.affects(&blind));

        let global_reader = InfluenceSet::new(ElementSet::All, ElementSet::empty());
        assert!(writer.affects(&global_reader));
        assert!(!blind.affects(&global_reader));
    }
}
