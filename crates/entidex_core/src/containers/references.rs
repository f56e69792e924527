//! References container: every reference instance of one entity.

use crate::error::CoreResult;
use crate::types::{AttributeKey, GroupReference, Locale, PrimaryKey, ReferenceKey};
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One reference instance with its group and reference-scoped attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Identity of the reference.
    pub key: ReferenceKey,
    /// Current group assignment.
    pub group: Option<GroupReference>,
    /// Reference-scoped attribute values.
    attributes: BTreeMap<AttributeKey, AttributeValue>,
    /// Monotonic version.
    pub version: u32,
    /// False when the reference has been removed.
    pub exists: bool,
}

impl Reference {
    /// Creates a fresh live reference.
    #[must_use]
    pub fn new(key: ReferenceKey, group: Option<GroupReference>) -> Self {
        Self {
            key,
            group,
            attributes: BTreeMap::new(),
            version: 1,
            exists: true,
        }
    }

    /// Returns the stored attribute record, tombstones included.
    #[must_use]
    pub fn attribute(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Returns the live attribute value.
    #[must_use]
    pub fn live_attribute(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.attribute(key).filter(|v| v.exists)
    }

    /// Replaces the attribute record with the result of `f`.
    pub fn upsert_attribute(
        &mut self,
        key: AttributeKey,
        f: impl FnOnce(Option<&AttributeValue>) -> CoreResult<AttributeValue>,
    ) -> CoreResult<()> {
        let next = f(self.attributes.get(&key))?;
        self.attributes.insert(key, next);
        Ok(())
    }

    /// Iterates live attribute values.
    pub fn live_attributes(&self) -> impl Iterator<Item = &AttributeValue> {
        self.attributes.values().filter(|v| v.exists)
    }

    /// Locales used by live localized attributes of this reference.
    #[must_use]
    pub fn attribute_locales(&self) -> BTreeSet<Locale> {
        self.live_attributes()
            .filter_map(|v| v.key.locale.clone())
            .collect()
    }
}

/// All references of one entity, ordered by reference key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencesContainer {
    /// Primary key of the owning entity.
    pub entity_pk: PrimaryKey,
    references: BTreeMap<ReferenceKey, Reference>,
    dirty: bool,
}

impl ReferencesContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new(entity_pk: PrimaryKey) -> Self {
        Self {
            entity_pk,
            references: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Returns the stored reference, removed ones included.
    #[must_use]
    pub fn get(&self, key: &ReferenceKey) -> Option<&Reference> {
        self.references.get(key)
    }

    /// Returns the live reference.
    #[must_use]
    pub fn get_live(&self, key: &ReferenceKey) -> Option<&Reference> {
        self.get(key).filter(|r| r.exists)
    }

    /// Inserts a fresh reference or revives a removed one. A revived
    /// reference continues the version counter but starts with clean
    /// attributes and the given group.
    pub fn insert(&mut self, key: ReferenceKey, group: Option<GroupReference>) {
        let next = match self.references.get(&key) {
            Some(prior) => {
                let mut fresh = Reference::new(key.clone(), group);
                fresh.version = prior.version + 1;
                fresh
            }
            None => Reference::new(key.clone(), group),
        };
        self.references.insert(key, next);
        self.dirty = true;
    }

    /// Mutates a stored reference in place through `f`.
    pub fn update(
        &mut self,
        key: &ReferenceKey,
        f: impl FnOnce(&mut Reference) -> CoreResult<()>,
    ) -> CoreResult<bool> {
        match self.references.get_mut(key) {
            Some(reference) => {
                f(reference)?;
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Iterates live references.
    pub fn live(&self) -> impl Iterator<Item = &Reference> {
        self.references.values().filter(|r| r.exists)
    }

    /// Counts live references with the given name.
    #[must_use]
    pub fn count_live(&self, name: &str) -> usize {
        self.live().filter(|r| r.key.name == name).count()
    }

    /// Returns true when any live reference still carries a live localized
    /// attribute in the given locale.
    #[must_use]
    pub fn locale_in_use(&self, locale: &Locale) -> bool {
        self.live()
            .any(|r| r.attribute_locales().contains(locale))
    }

    /// Returns true when no live reference remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live().next().is_none()
    }

    /// Returns true when the container changed since load.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
