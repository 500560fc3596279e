//! # Canonical Relation Sets
//!
//! A `RelationSet` names "the relations already combined into one partial plan".
//! The search creates the same logical set many times over (every way of
//! reaching `{A, B, C}` produces it again), so sets are *interned*: the
//! `RelationSetManager` guarantees that logically equal member lists resolve to
//! exactly one stored instance, and hands out a small `Copy` handle to it.
//! Comparing two handles from the same manager is therefore the same as
//! comparing the sets element by element.
//!
//! ## Prefix Tree
//!
//! Interning walks an arena-indexed prefix tree keyed on the sorted id
//! sequence. Every node corresponds to one sorted prefix; a node holds the
//! canonical set for its prefix once that prefix has been requested as a set.
//!
//! ```text
//! root ─0─> n1 [ {0} ] ─2─> n3 [ {0,2} ]
//!   └──1──> n2 [ {1} ] ─2─> n4 [ {1,2} ]
//! ```
//!
//! Lookup and creation are O(k) for a set of k relations. Nodes and sets live in
//! flat vectors owned by the manager and are released together when the
//! optimization pass drops it.
//!
//! ## Set Algebra
//!
//! Only the operations the search needs are provided: `union` (a linear merge
//! of two disjoint sorted sequences) and `is_subset` (a two-pointer scan).
//! Both rely on members being stored in ascending order.

use std::collections::HashMap;
use std::fmt::Write;
use tracing::trace;

/// Identifier of one base relation within a single optimization pass (`0..N`).
pub type RelationId = usize;

/// Handle to a canonical relation set owned by a [`RelationSetManager`].
///
/// Handles are only meaningful for the manager that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationSet(u32);

impl RelationSet {
    /// Position of this set in the manager's arena (creation order).
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
struct TreeNode {
    set: Option<RelationSet>,
    children: HashMap<RelationId, usize>,
}

/// Interns every relation set created during one optimization pass.
#[derive(Debug)]
pub struct RelationSetManager {
    relation_count: usize,
    /// Prefix tree nodes; index 0 is the root (the empty prefix).
    nodes: Vec<TreeNode>,
    /// Sorted members of each interned set, indexed by `RelationSet`.
    sets: Vec<Box<[RelationId]>>,
}

impl RelationSetManager {
    /// Create a manager for a pass over `relation_count` base relations.
    pub fn new(relation_count: usize) -> Self {
        Self {
            relation_count,
            nodes: vec![TreeNode::default()],
            sets: Vec::new(),
        }
    }

    /// Number of distinct sets interned so far.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// The canonical singleton `{id}`.
    pub fn relation(&mut self, id: RelationId) -> RelationSet {
        self.check_in_range(id);
        self.intern(&[id])
    }

    /// The canonical set for an unordered collection of distinct ids.
    ///
    /// # Panics
    ///
    /// Panics if the collection is empty, contains an id twice, or names a
    /// relation outside `0..relation_count`.
    pub fn relation_from_bindings<I>(&mut self, bindings: I) -> RelationSet
    where
        I: IntoIterator<Item = RelationId>,
    {
        let mut ids: Vec<RelationId> = bindings.into_iter().collect();
        assert!(!ids.is_empty(), "a relation set needs at least one relation");
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            panic!("relation {} listed twice in relation set bindings", pair[0]);
        }
        if let Some(&last) = ids.last() {
            self.check_in_range(last);
        }
        self.intern(&ids)
    }

    /// The canonical set for ids the caller guarantees are ascending and
    /// duplicate-free. Ordering is only checked in debug builds.
    ///
    /// # Panics
    ///
    /// Panics if `ids` is empty or names a relation outside `0..relation_count`.
    pub fn relation_from_sorted(&mut self, ids: &[RelationId]) -> RelationSet {
        assert!(!ids.is_empty(), "a relation set needs at least one relation");
        debug_assert!(
            ids.windows(2).all(|w| w[0] < w[1]),
            "relation ids must be strictly ascending: {ids:?}"
        );
        if let Some(&last) = ids.last() {
            self.check_in_range(last);
        }
        self.intern(ids)
    }

    /// Union of two disjoint sets.
    ///
    /// `union(a, b)` and `union(b, a)` return the same handle.
    ///
    /// # Panics
    ///
    /// Panics if the sets share a relation: a relation can never be joined into
    /// the same plan twice, so an overlap means the caller built a bad pairing.
    pub fn union(&mut self, left: RelationSet, right: RelationSet) -> RelationSet {
        let lhs = &self.sets[left.index()];
        let rhs = &self.sets[right.index()];
        let mut merged = Vec::with_capacity(lhs.len() + rhs.len());

        let (mut i, mut j) = (0, 0);
        while i < lhs.len() && j < rhs.len() {
            if lhs[i] < rhs[j] {
                merged.push(lhs[i]);
                i += 1;
            } else if rhs[j] < lhs[i] {
                merged.push(rhs[j]);
                j += 1;
            } else {
                panic!(
                    "cannot union overlapping relation sets {} and {}: relation {} appears in both",
                    self.display(left),
                    self.display(right),
                    lhs[i]
                );
            }
        }
        merged.extend_from_slice(&lhs[i..]);
        merged.extend_from_slice(&rhs[j..]);

        self.intern(&merged)
    }

    /// True iff every member of `subset` is a member of `superset`.
    pub fn is_subset(&self, superset: RelationSet, subset: RelationSet) -> bool {
        let sup = self.members(superset);
        let sub = self.members(subset);
        if sub.len() > sup.len() {
            return false;
        }

        let mut i = 0;
        for &id in sub {
            while i < sup.len() && sup[i] < id {
                i += 1;
            }
            if i == sup.len() || sup[i] != id {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Sorted members of `set`.
    pub fn members(&self, set: RelationSet) -> &[RelationId] {
        &self.sets[set.index()]
    }

    pub fn size(&self, set: RelationSet) -> usize {
        self.sets[set.index()].len()
    }

    /// Render a set as `[0, 2, 5]`.
    pub fn display(&self, set: RelationSet) -> String {
        let mut out = String::from("[");
        for (i, id) in self.members(set).iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{id}");
        }
        out.push(']');
        out
    }

    fn check_in_range(&self, id: RelationId) {
        assert!(
            id < self.relation_count,
            "relation id {id} out of range for a pass over {} relations",
            self.relation_count
        );
    }

    fn intern(&mut self, ids: &[RelationId]) -> RelationSet {
        let mut node = 0;
        for &id in ids {
            node = match self.nodes[node].children.get(&id) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TreeNode::default());
                    self.nodes[node].children.insert(id, child);
                    child
                }
            };
        }

        if let Some(set) = self.nodes[node].set {
            return set;
        }

        let set = RelationSet(self.sets.len() as u32);
        self.sets.push(ids.into());
        self.nodes[node].set = Some(set);
        trace!("Interned relation set {:?} as #{}", ids, set.0);
        set
    }
}
