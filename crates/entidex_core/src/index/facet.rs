//! Facet index: which entities carry which referenced facets, by group.

use crate::error::{CoreError, CoreResult};
use crate::types::{PrimaryKey, ReferenceKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Facet occurrences grouped by reference name, then facet group, then
/// referenced primary key, mapping to the set of owning entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetIndex {
    references: BTreeMap<String, GroupMap>,
}

type GroupMap = BTreeMap<Option<PrimaryKey>, BTreeMap<PrimaryKey, BTreeSet<PrimaryKey>>>;

impl FacetIndex {
    /// Records that `owner` carries the facet, under the given group.
    pub fn insert(
        &mut self,
        reference: &ReferenceKey,
        group: Option<PrimaryKey>,
        owner: PrimaryKey,
    ) -> CoreResult<()> {
        let inserted = self
            .references
            .entry(reference.name.clone())
            .or_default()
            .entry(group)
            .or_default()
            .entry(reference.referenced_pk)
            .or_default()
            .insert(owner);
        if !inserted {
            return Err(CoreError::premise(format!(
                "facet index already holds {reference} for owner {owner}"
            )));
        }
        Ok(())
    }

    /// Removes the facet occurrence, pruning emptied levels.
    pub fn remove(
        &mut self,
        reference: &ReferenceKey,
        group: Option<PrimaryKey>,
        owner: PrimaryKey,
    ) -> CoreResult<()> {
        let missing = || {
            CoreError::premise(format!(
                "facet index does not hold {reference} for owner {owner}"
            ))
        };
        let groups = self.references.get_mut(&reference.name).ok_or_else(missing)?;
        let facets = groups.get_mut(&group).ok_or_else(missing)?;
        let owners = facets.get_mut(&reference.referenced_pk).ok_or_else(missing)?;
        if !owners.remove(&owner) {
            return Err(missing());
        }
        if owners.is_empty() {
            facets.remove(&reference.referenced_pk);
        }
        if facets.is_empty() {
            groups.remove(&group);
        }
        if groups.is_empty() {
            self.references.remove(&reference.name);
        }
        Ok(())
    }

    /// Returns the owners of a facet within a group.
    #[must_use]
    pub fn owners(
        &self,
        reference: &ReferenceKey,
        group: Option<PrimaryKey>,
    ) -> Option<&BTreeSet<PrimaryKey>> {
        self.references
            .get(&reference.name)?
            .get(&group)?
            .get(&reference.referenced_pk)
    }

    /// Returns true when no facet is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_remove_round_trip_prunes_levels() {
        let mut idx = FacetIndex::default();
        let brand = ReferenceKey::new("brand", PrimaryKey::new(10));
        let group = Some(PrimaryKey::new(5));
        idx.insert(&brand, group, PrimaryKey::new(1)).unwrap();
        assert_eq!(idx.owners(&brand, group).map(BTreeSet::len), Some(1));
        assert!(idx.owners(&brand, None).is_none());

        idx.remove(&brand, group, PrimaryKey::new(1)).unwrap();
        assert!(idx.is_empty());
    }

    #[test]
    fn duplicate_and_missing_occurrences_break_premises() {
        let mut idx = FacetIndex::default();
        let brand = ReferenceKey::new("brand", PrimaryKey::new(10));
        idx.insert(&brand, None, PrimaryKey::new(1)).unwrap();
        assert!(idx.insert(&brand, None, PrimaryKey::new(1)).is_err());
        assert!(idx.remove(&brand, Some(PrimaryKey::new(9)), PrimaryKey::new(1)).is_err());
    }
}
