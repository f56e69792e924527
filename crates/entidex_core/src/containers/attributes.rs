//! Attribute containers: one global set plus one per locale.

use crate::error::CoreResult;
use crate::types::{AttributeKey, Locale, PrimaryKey};
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute values of one entity for one scope (global or a single locale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributesContainer {
    /// Primary key of the owning entity.
    pub entity_pk: PrimaryKey,
    /// Locale scope; `None` for the non-localized container.
    pub locale: Option<Locale>,
    attributes: BTreeMap<AttributeKey, AttributeValue>,
    dirty: bool,
}

impl AttributesContainer {
    /// Creates an empty container for the given scope.
    #[must_use]
    pub fn new(entity_pk: PrimaryKey, locale: Option<Locale>) -> Self {
        Self {
            entity_pk,
            locale,
            attributes: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Returns the stored record for the key, tombstones included.
    #[must_use]
    pub fn get(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Returns the live value for the key.
    #[must_use]
    pub fn live(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.get(key).filter(|v| v.exists)
    }

    /// Replaces the record for `key` with the result of `f` applied to the
    /// current record.
    pub fn upsert(
        &mut self,
        key: AttributeKey,
        f: impl FnOnce(Option<&AttributeValue>) -> CoreResult<AttributeValue>,
    ) -> CoreResult<()> {
        let next = f(self.attributes.get(&key))?;
        self.attributes.insert(key, next);
        self.dirty = true;
        Ok(())
    }

    /// Iterates live values.
    pub fn live_values(&self) -> impl Iterator<Item = &AttributeValue> {
        self.attributes.values().filter(|v| v.exists)
    }

    /// Returns true when no live value remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_values().next().is_none()
    }

    /// Returns true when the container changed since load.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
