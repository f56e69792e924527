//! Hierarchy index: parent/child placement of entities.
//!
//! Removing a node detaches it without cascading: its children keep pointing
//! at the removed parent and are re-attached when the node is placed again.

use crate::error::{CoreError, CoreResult};
use crate::types::PrimaryKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Parent/child placement of entities within one index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyIndex {
    nodes: BTreeMap<PrimaryKey, Option<PrimaryKey>>,
    children: BTreeMap<PrimaryKey, BTreeSet<PrimaryKey>>,
    roots: BTreeSet<PrimaryKey>,
}

impl HierarchyIndex {
    /// Places (or repositions) `pk` under `parent`; `None` makes it a root.
    pub fn set_parent(&mut self, pk: PrimaryKey, parent: Option<PrimaryKey>) -> CoreResult<()> {
        if parent == Some(pk) {
            return Err(CoreError::premise(format!(
                "hierarchy node {pk} cannot be its own parent"
            )));
        }
        self.detach(pk);
        match parent {
            Some(p) => {
                self.children.entry(p).or_default().insert(pk);
            }
            None => {
                self.roots.insert(pk);
            }
        }
        self.nodes.insert(pk, parent);
        Ok(())
    }

    /// Detaches `pk` from the hierarchy. Its subtree is kept and re-attaches
    /// when `pk` is placed again.
    pub fn remove(&mut self, pk: PrimaryKey) -> CoreResult<Option<PrimaryKey>> {
        let parent = self.nodes.remove(&pk).ok_or_else(|| {
            CoreError::premise(format!("hierarchy does not hold node {pk}"))
        })?;
        self.detach_edges(pk, parent);
        Ok(parent)
    }

    fn detach(&mut self, pk: PrimaryKey) {
        if let Some(parent) = self.nodes.remove(&pk) {
            self.detach_edges(pk, parent);
        }
    }

    fn detach_edges(&mut self, pk: PrimaryKey, parent: Option<PrimaryKey>) {
        match parent {
            Some(p) => {
                if let Some(set) = self.children.get_mut(&p) {
                    set.remove(&pk);
                    if set.is_empty() {
                        self.children.remove(&p);
                    }
                }
            }
            None => {
                self.roots.remove(&pk);
            }
        }
    }

    /// Returns the placement of `pk`: `None` when unplaced, `Some(parent)`
    /// when placed (with `None` parent meaning root).
    #[must_use]
    pub fn placement(&self, pk: PrimaryKey) -> Option<Option<PrimaryKey>> {
        self.nodes.get(&pk).copied()
    }

    /// Returns the attached children of `pk`.
    #[must_use]
    pub fn children_of(&self, pk: PrimaryKey) -> Option<&BTreeSet<PrimaryKey>> {
        self.children.get(&pk)
    }

    /// Returns the root nodes.
    #[must_use]
    pub fn roots(&self) -> &BTreeSet<PrimaryKey> {
        &self.roots
    }

    /// Returns true when no node is placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reposition_moves_between_parents() {
        let mut h = HierarchyIndex::default();
        h.set_parent(PrimaryKey::new(1), None).unwrap();
        h.set_parent(PrimaryKey::new(2), Some(PrimaryKey::new(1))).unwrap();
        h.set_parent(PrimaryKey::new(3), None).unwrap();

        h.set_parent(PrimaryKey::new(2), Some(PrimaryKey::new(3))).unwrap();
        assert!(h.children_of(PrimaryKey::new(1)).is_none());
        assert!(h
            .children_of(PrimaryKey::new(3))
            .is_some_and(|c| c.contains(&PrimaryKey::new(2))));
    }

    #[test]
    fn removal_keeps_the_subtree_orphaned() {
        let mut h = HierarchyIndex::default();
        h.set_parent(PrimaryKey::new(1), None).unwrap();
        h.set_parent(PrimaryKey::new(2), Some(PrimaryKey::new(1))).unwrap();

        let prior = h.remove(PrimaryKey::new(1)).unwrap();
        assert_eq!(prior, None);
        assert!(h.placement(PrimaryKey::new(1)).is_none());
        // the child still points at the removed parent
        assert_eq!(h.placement(PrimaryKey::new(2)), Some(Some(PrimaryKey::new(1))));

        // placing the parent again re-attaches the subtree
        h.set_parent(PrimaryKey::new(1), None).unwrap();
        assert!(h
            .children_of(PrimaryKey::new(1))
            .is_some_and(|c| c.contains(&PrimaryKey::new(2))));
    }

    #[test]
    fn self_parent_is_rejected() {
        let mut h = HierarchyIndex::default();
        assert!(h.set_parent(PrimaryKey::new(1), Some(PrimaryKey::new(1))).is_err());
    }
}
