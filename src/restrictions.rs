//! Turn-restriction index.
//!
//! Answers two queries for a turn `(from, via, to)` over junction nodes:
//! whether an only-turn restriction pins the continuation from
//! `(from, via)` to one specific target, and whether the individual turn
//! is forbidden outright.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::NodeId;

#[derive(Debug, Clone, Default)]
pub struct RestrictionMap {
    only_targets: FxHashMap<(NodeId, NodeId), NodeId>,
    forbidden: FxHashSet<(NodeId, NodeId, NodeId)>,
}

impl RestrictionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The only permitted continuation from `(from, via)` is `to`.
    pub fn add_only_turn(&mut self, from: NodeId, via: NodeId, to: NodeId) {
        self.only_targets.insert((from, via), to);
    }

    /// The turn `(from, via, to)` is forbidden.
    pub fn add_restriction(&mut self, from: NodeId, via: NodeId, to: NodeId) {
        self.forbidden.insert((from, via, to));
    }

    pub fn only_turn_target(&self, from: NodeId, via: NodeId) -> Option<NodeId> {
        self.only_targets.get(&(from, via)).copied()
    }

    pub fn is_restricted(&self, from: NodeId, via: NodeId, to: NodeId) -> bool {
        self.forbidden.contains(&(from, via, to))
    }

    /// All only-turn rules as `(from, via, to)` triples.
    pub fn iter_only_turns(&self) -> impl Iterator<Item = (NodeId, NodeId, NodeId)> + '_ {
        self.only_targets
            .iter()
            .map(|(&(from, via), &to)| (from, via, to))
    }

    /// All forbidden turns as `(from, via, to)` triples.
    pub fn iter_forbidden(&self) -> impl Iterator<Item = (NodeId, NodeId, NodeId)> + '_ {
        self.forbidden.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.only_targets.len() + self.forbidden.len()
    }

    pub fn is_empty(&self) -> bool {
        self.only_targets.is_empty() && self.forbidden.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_turn_lookup() {
        let mut map = RestrictionMap::new();
        map.add_only_turn(1, 2, 3);

        assert_eq!(map.only_turn_target(1, 2), Some(3));
        assert_eq!(map.only_turn_target(2, 1), None);
        assert!(!map.is_restricted(1, 2, 4));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_forbidden_turn_lookup() {
        let mut map = RestrictionMap::new();
        map.add_restriction(1, 2, 3);

        assert!(map.is_restricted(1, 2, 3));
        assert!(!map.is_restricted(3, 2, 1));
    }
}
