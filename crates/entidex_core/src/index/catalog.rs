//! Catalog index: attribute values unique across all collections.

use crate::error::{CoreError, CoreResult};
use crate::types::{AttributeKey, EntityType, PrimaryKey};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Owner of a globally unique value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalOwner {
    /// Collection of the owning entity.
    pub entity_type: EntityType,
    /// Primary key of the owning entity.
    pub primary_key: PrimaryKey,
}

/// Catalog-wide unique attribute index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogIndex {
    unique: BTreeMap<AttributeKey, BTreeMap<Value, GlobalOwner>>,
}

impl CatalogIndex {
    /// Creates an empty catalog index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a globally unique value for the entity.
    pub fn insert_unique(
        &mut self,
        attribute: &AttributeKey,
        value: Value,
        entity_type: &EntityType,
        pk: PrimaryKey,
    ) -> CoreResult<()> {
        let owner = GlobalOwner {
            entity_type: entity_type.clone(),
            primary_key: pk,
        };
        let values = self.unique.entry(attribute.clone()).or_default();
        if let Some(existing) = values.get(&value) {
            if *existing != owner {
                return Err(CoreError::UniqueConstraintViolated {
                    attribute: attribute.to_string(),
                    existing: existing.primary_key.get(),
                    incoming: pk.get(),
                });
            }
        }
        values.insert(value, owner);
        Ok(())
    }

    /// Releases a globally unique value held by the entity.
    pub fn remove_unique(
        &mut self,
        attribute: &AttributeKey,
        value: &Value,
        entity_type: &EntityType,
        pk: PrimaryKey,
    ) -> CoreResult<()> {
        let values = self.unique.get_mut(attribute).ok_or_else(|| {
            CoreError::premise(format!("no catalog unique index for attribute {attribute}"))
        })?;
        match values.get(value) {
            Some(owner) if owner.entity_type == *entity_type && owner.primary_key == pk => {
                values.remove(value);
                if values.is_empty() {
                    self.unique.remove(attribute);
                }
                Ok(())
            }
            _ => Err(CoreError::premise(format!(
                "catalog unique index for {attribute} does not hold {value} for {entity_type}/{pk}"
            ))),
        }
    }

    /// Looks up the owner of a globally unique value.
    #[must_use]
    pub fn owner_of(&self, attribute: &AttributeKey, value: &Value) -> Option<&GlobalOwner> {
        self.unique.get(attribute).and_then(|values| values.get(value))
    }

    /// Returns true when nothing is claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniqueness_spans_entity_types() {
        let mut idx = CatalogIndex::new();
        let attr = AttributeKey::global("url");
        idx.insert_unique(&attr, Value::Str("/a".into()), &EntityType::new("Product"), PrimaryKey::new(1))
            .unwrap();
        let err = idx
            .insert_unique(&attr, Value::Str("/a".into()), &EntityType::new("Brand"), PrimaryKey::new(1))
            .unwrap_err();
        assert!(matches!(err, CoreError::UniqueConstraintViolated { .. }));
    }

    #[test]
    fn remove_requires_matching_owner() {
        let mut idx = CatalogIndex::new();
        let attr = AttributeKey::global("url");
        let ty = EntityType::new("Product");
        idx.insert_unique(&attr, Value::Str("/a".into()), &ty, PrimaryKey::new(1))
            .unwrap();
        assert!(idx
            .remove_unique(&attr, &Value::Str("/a".into()), &ty, PrimaryKey::new(2))
            .is_err());
        idx.remove_unique(&attr, &Value::Str("/a".into()), &ty, PrimaryKey::new(1))
            .unwrap();
        assert!(idx.is_empty());
    }
}
