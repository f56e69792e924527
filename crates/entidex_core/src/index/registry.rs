//! Registry of entity indexes for one collection.

use super::entity::EntityIndex;
use super::key::IndexKey;
use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use tracing::debug;

/// Owns every entity index of one collection, keyed by [`IndexKey`].
///
/// Reduced indexes are created on first touch and dropped once a committed
/// batch leaves them empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRegistry {
    indexes: HashMap<IndexKey, EntityIndex>,
}

impl IndexRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index for the key, creating it when absent.
    pub fn get_or_create(&mut self, key: &IndexKey) -> &mut EntityIndex {
        self.indexes
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(index = %key, "entity index created");
                EntityIndex::new(key.clone())
            })
    }

    /// Returns the index for the key, if it exists.
    #[must_use]
    pub fn get(&self, key: &IndexKey) -> Option<&EntityIndex> {
        self.indexes.get(key)
    }

    /// Mutable access to an existing index.
    pub fn get_mut(&mut self, key: &IndexKey) -> Option<&mut EntityIndex> {
        self.indexes.get_mut(key)
    }

    /// Returns an existing index or breaks a premise.
    pub fn get_existing(&mut self, key: &IndexKey) -> CoreResult<&mut EntityIndex> {
        self.indexes
            .get_mut(key)
            .ok_or_else(|| CoreError::premise(format!("entity index {key} does not exist")))
    }

    /// Returns true when the key is present.
    #[must_use]
    pub fn contains(&self, key: &IndexKey) -> bool {
        self.indexes.contains_key(key)
    }

    /// Drops the index for the key.
    pub fn remove(&mut self, key: &IndexKey) -> Option<EntityIndex> {
        let removed = self.indexes.remove(key);
        if removed.is_some() {
            debug!(index = %key, "entity index removed");
        }
        removed
    }

    /// Iterates the registered index keys.
    pub fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.indexes.keys()
    }

    /// Number of registered indexes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Returns true when no index is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimaryKey;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut registry = IndexRegistry::new();
        registry
            .get_or_create(&IndexKey::Global)
            .insert_primary_key(PrimaryKey::new(1));
        assert!(registry
            .get_or_create(&IndexKey::Global)
            .contains_primary_key(PrimaryKey::new(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn get_existing_breaks_premise_on_missing_index() {
        let mut registry = IndexRegistry::new();
        assert!(registry.get_existing(&IndexKey::Global).is_err());
    }
}
