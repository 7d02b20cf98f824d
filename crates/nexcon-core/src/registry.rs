//! Dependency registry
//!
//! Reverse index of depends_on edges: for every transform, the set of entities
//! (components or transforms) whose depends_on currently targets it. The store
//! has no back-reference field, so this index is derived: it is updated in the
//! same call as every depends_on write and rebuilt once when a document is
//! loaded. It is never persisted.

use std::collections::{BTreeMap, BTreeSet};

use crate::store::NodeId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyRegistry {
    dependents: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` points at `target`. Returns false if already recorded.
    pub fn register(&mut self, target: NodeId, dependent: NodeId) -> bool {
        self.dependents.entry(target).or_default().insert(dependent)
    }

    /// Forget that `dependent` points at `target`. Returns false if it was not recorded.
    pub fn deregister(&mut self, target: NodeId, dependent: NodeId) -> bool {
        let Some(set) = self.dependents.get_mut(&target) else {
            return false;
        };
        let removed = set.remove(&dependent);
        if set.is_empty() {
            self.dependents.remove(&target);
        }
        removed
    }

    /// Current dependents of `target` (empty when it is deletable)
    pub fn dependents_of(&self, target: NodeId) -> BTreeSet<NodeId> {
        self.dependents.get(&target).cloned().unwrap_or_default()
    }

    pub fn has_dependents(&self, target: NodeId) -> bool {
        self.dependents
            .get(&target)
            .map(|set| !set.is_empty())
            .unwrap_or(false)
    }

    /// Drop every edge touching `node`, as target or as dependent
    pub fn forget(&mut self, node: NodeId) {
        self.dependents.remove(&node);
        self.dependents.retain(|_, set| {
            set.remove(&node);
            !set.is_empty()
        });
    }

    /// All (target, dependent) edges in id order
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.dependents
            .iter()
            .flat_map(|(target, set)| set.iter().map(move |dep| (*target, *dep)))
    }

    pub fn edge_count(&self) -> usize {
        self.dependents.values().map(BTreeSet::len).sum()
    }

    pub fn clear(&mut self) {
        self.dependents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> NodeId {
        NodeId::from_raw(raw)
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut reg = DependencyRegistry::new();
        assert!(reg.register(id(1), id(2)));
        assert!(!reg.register(id(1), id(2)));
        assert_eq!(reg.edge_count(), 1);
    }

    #[test]
    fn test_deregister_is_idempotent_and_prunes() {
        let mut reg = DependencyRegistry::new();
        reg.register(id(1), id(2));
        assert!(reg.deregister(id(1), id(2)));
        assert!(!reg.deregister(id(1), id(2)));
        assert!(!reg.has_dependents(id(1)));
        assert_eq!(reg, DependencyRegistry::new());
    }

    #[test]
    fn test_multiple_dependents_share_target() {
        let mut reg = DependencyRegistry::new();
        reg.register(id(1), id(2));
        reg.register(id(1), id(3));
        assert_eq!(
            reg.dependents_of(id(1)).into_iter().collect::<Vec<_>>(),
            vec![id(2), id(3)]
        );
    }

    #[test]
    fn test_forget_removes_both_directions() {
        let mut reg = DependencyRegistry::new();
        reg.register(id(1), id(2));
        reg.register(id(2), id(3));
        reg.forget(id(2));
        assert_eq!(reg.edge_count(), 0);
    }
}
