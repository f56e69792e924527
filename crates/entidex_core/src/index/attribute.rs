//! Attribute-level index structures: unique, filter, and sort.
//!
//! All of them are remove-then-insert structures: callers never overwrite in
//! place, and removals of state that is not present break a premise.

use crate::error::{CoreError, CoreResult};
use crate::types::{AttributeKey, PrimaryKey};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Value-to-owner map enforcing uniqueness of attribute values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniqueIndex {
    map: BTreeMap<Value, PrimaryKey>,
}

impl UniqueIndex {
    /// Claims `value` for `pk`. Fails when another entity already owns it.
    pub fn insert(&mut self, attribute: &AttributeKey, value: Value, pk: PrimaryKey) -> CoreResult<()> {
        if let Some(existing) = self.map.get(&value) {
            if *existing != pk {
                return Err(CoreError::UniqueConstraintViolated {
                    attribute: attribute.to_string(),
                    existing: existing.get(),
                    incoming: pk.get(),
                });
            }
        }
        self.map.insert(value, pk);
        Ok(())
    }

    /// Releases `value` held by `pk`.
    pub fn remove(&mut self, attribute: &AttributeKey, value: &Value, pk: PrimaryKey) -> CoreResult<()> {
        match self.map.get(value) {
            Some(existing) if *existing == pk => {
                self.map.remove(value);
                Ok(())
            }
            _ => Err(CoreError::premise(format!(
                "unique index for {attribute} does not hold {value} for primary key {pk}"
            ))),
        }
    }

    /// Returns the owner of `value`, if claimed.
    #[must_use]
    pub fn get(&self, value: &Value) -> Option<PrimaryKey> {
        self.map.get(value).copied()
    }

    /// Returns true when no value is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Value-to-owner map backing equality filters. Array values are indexed
/// element-wise.
///
/// Occurrences are counted per owner: in reduced per-reference-type indexes
/// several owning entities project the same value onto one referenced
/// primary key, so insert/remove must be exact inverses rather than set
/// operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterIndex {
    map: BTreeMap<Value, BTreeMap<PrimaryKey, u32>>,
}

impl FilterIndex {
    fn scalars(value: &Value) -> Vec<&Value> {
        match value {
            Value::Array(items) => items.iter().collect(),
            scalar => vec![scalar],
        }
    }

    /// Indexes `pk` under `value` (each element for arrays).
    pub fn insert(&mut self, _attribute: &AttributeKey, value: &Value, pk: PrimaryKey) -> CoreResult<()> {
        for scalar in Self::scalars(value) {
            *self
                .map
                .entry(scalar.clone())
                .or_default()
                .entry(pk)
                .or_insert(0) += 1;
        }
        Ok(())
    }

    /// Un-indexes `pk` from `value` (each element for arrays).
    pub fn remove(&mut self, attribute: &AttributeKey, value: &Value, pk: PrimaryKey) -> CoreResult<()> {
        for scalar in Self::scalars(value) {
            let counts = self.map.get_mut(scalar).ok_or_else(|| {
                CoreError::premise(format!(
                    "filter index for {attribute} does not hold {scalar}"
                ))
            })?;
            let count = counts.get_mut(&pk).ok_or_else(|| {
                CoreError::premise(format!(
                    "filter index for {attribute} does not hold {scalar} for primary key {pk}"
                ))
            })?;
            *count -= 1;
            if *count == 0 {
                counts.remove(&pk);
            }
            if counts.is_empty() {
                self.map.remove(scalar);
            }
        }
        Ok(())
    }

    /// Returns the owners of `value`.
    #[must_use]
    pub fn get(&self, value: &Value) -> Option<BTreeSet<PrimaryKey>> {
        self.map
            .get(value)
            .map(|counts| counts.keys().copied().collect())
    }

    /// Returns true when `pk` is indexed under `value`.
    #[must_use]
    pub fn contains(&self, value: &Value, pk: PrimaryKey) -> bool {
        self.map.get(value).is_some_and(|counts| counts.contains_key(&pk))
    }

    /// Returns true when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Order-preserving index over one comparable key per entity. Shared by the
/// single-attribute sort index (`K = Value`) and the compound index
/// (`K = CompoundTuple`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortIndex<K: Ord + Clone> {
    by_pk: BTreeMap<PrimaryKey, K>,
    ordered: BTreeSet<(K, PrimaryKey)>,
}

impl<K: Ord + Clone> Default for SortIndex<K> {
    fn default() -> Self {
        Self {
            by_pk: BTreeMap::new(),
            ordered: BTreeSet::new(),
        }
    }
}

impl<K: Ord + Clone + std::fmt::Debug> SortIndex<K> {
    /// Indexes `pk` under `key`. The entity must not be present yet.
    pub fn insert(&mut self, name: &str, key: K, pk: PrimaryKey) -> CoreResult<()> {
        if self.by_pk.contains_key(&pk) {
            return Err(CoreError::premise(format!(
                "sort index {name} already holds primary key {pk}; remove first"
            )));
        }
        self.ordered.insert((key.clone(), pk));
        self.by_pk.insert(pk, key);
        Ok(())
    }

    /// Un-indexes `pk`, verifying it was stored under `key`.
    pub fn remove(&mut self, name: &str, key: &K, pk: PrimaryKey) -> CoreResult<()> {
        match self.by_pk.get(&pk) {
            Some(stored) if stored == key => {
                self.ordered.remove(&(key.clone(), pk));
                self.by_pk.remove(&pk);
                Ok(())
            }
            Some(stored) => Err(CoreError::premise(format!(
                "sort index {name} holds {stored:?} for primary key {pk}, not {key:?}"
            ))),
            None => Err(CoreError::premise(format!(
                "sort index {name} does not hold primary key {pk}"
            ))),
        }
    }

    /// Returns the key the entity is sorted under.
    #[must_use]
    pub fn key_of(&self, pk: PrimaryKey) -> Option<&K> {
        self.by_pk.get(&pk)
    }

    /// Iterates primary keys in key order.
    pub fn ordered_pks(&self) -> impl Iterator<Item = PrimaryKey> + '_ {
        self.ordered.iter().map(|(_, pk)| *pk)
    }

    /// Returns true when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_pk.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr() -> AttributeKey {
        AttributeKey::global("code")
    }

    #[test]
    fn unique_rejects_second_owner() {
        let mut idx = UniqueIndex::default();
        idx.insert(&attr(), Value::Str("a".into()), PrimaryKey::new(1))
            .unwrap();
        let err = idx
            .insert(&attr(), Value::Str("a".into()), PrimaryKey::new(2))
            .unwrap_err();
        match err {
            CoreError::UniqueConstraintViolated { existing, incoming, .. } => {
                assert_eq!(existing, 1);
                assert_eq!(incoming, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unique_remove_requires_matching_owner() {
        let mut idx = UniqueIndex::default();
        idx.insert(&attr(), Value::Str("a".into()), PrimaryKey::new(1))
            .unwrap();
        assert!(idx
            .remove(&attr(), &Value::Str("a".into()), PrimaryKey::new(2))
            .is_err());
        idx.remove(&attr(), &Value::Str("a".into()), PrimaryKey::new(1))
            .unwrap();
        assert!(idx.is_empty());
    }

    #[test]
    fn filter_indexes_arrays_element_wise() {
        let mut idx = FilterIndex::default();
        let tags = Value::Array(vec![Value::Str("new".into()), Value::Str("sale".into())]);
        idx.insert(&attr(), &tags, PrimaryKey::new(1)).unwrap();
        assert!(idx.get(&Value::Str("new".into())).is_some());
        assert!(idx.get(&Value::Str("sale".into())).is_some());

        idx.remove(&attr(), &tags, PrimaryKey::new(1)).unwrap();
        assert!(idx.is_empty());
    }

    #[test]
    fn sort_insert_requires_prior_removal() {
        let mut idx: SortIndex<Value> = SortIndex::default();
        idx.insert("order", Value::Int(5), PrimaryKey::new(1)).unwrap();
        assert!(idx.insert("order", Value::Int(6), PrimaryKey::new(1)).is_err());
        idx.remove("order", &Value::Int(5), PrimaryKey::new(1)).unwrap();
        idx.insert("order", Value::Int(6), PrimaryKey::new(1)).unwrap();
    }

    #[test]
    fn sort_orders_by_key_then_pk() {
        let mut idx: SortIndex<Value> = SortIndex::default();
        idx.insert("order", Value::Int(2), PrimaryKey::new(3)).unwrap();
        idx.insert("order", Value::Int(1), PrimaryKey::new(7)).unwrap();
        idx.insert("order", Value::Int(2), PrimaryKey::new(1)).unwrap();
        let pks: Vec<u32> = idx.ordered_pks().map(PrimaryKey::get).collect();
        assert_eq!(pks, vec![7, 1, 3]);
    }
}
