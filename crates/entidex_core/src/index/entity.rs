//! One entity index: global or reduced, same structure either way.

use super::attribute::{FilterIndex, SortIndex, UniqueIndex};
use super::facet::FacetIndex;
use super::hierarchy::HierarchyIndex;
use super::key::IndexKey;
use super::price::{IndexedPrice, PriceIndex};
use crate::error::{CoreError, CoreResult};
use crate::types::{AttributeKey, Locale, PrimaryKey, ReferenceKey};
use crate::value::{CompoundTuple, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// All secondary structures describing one slice of a collection.
///
/// The global index holds every entity of the collection; reduced indexes
/// hold the subset visible through one reference (type or instance). The
/// structure is identical, only the primary keys they track differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityIndex {
    /// Identity of this index.
    pub key: IndexKey,
    primary_keys: BTreeSet<PrimaryKey>,
    pk_cardinalities: BTreeMap<PrimaryKey, u32>,
    languages: BTreeMap<Locale, BTreeSet<PrimaryKey>>,
    unique: BTreeMap<AttributeKey, UniqueIndex>,
    filter: BTreeMap<AttributeKey, FilterIndex>,
    sort: BTreeMap<AttributeKey, SortIndex<Value>>,
    compounds: BTreeMap<AttributeKey, SortIndex<CompoundTuple>>,
    facets: FacetIndex,
    prices: PriceIndex,
    hierarchy: HierarchyIndex,
}

impl EntityIndex {
    /// Creates an empty index with the given identity.
    #[must_use]
    pub fn new(key: IndexKey) -> Self {
        Self {
            key,
            primary_keys: BTreeSet::new(),
            pk_cardinalities: BTreeMap::new(),
            languages: BTreeMap::new(),
            unique: BTreeMap::new(),
            filter: BTreeMap::new(),
            sort: BTreeMap::new(),
            compounds: BTreeMap::new(),
            facets: FacetIndex::default(),
            prices: PriceIndex::default(),
            hierarchy: HierarchyIndex::default(),
        }
    }

    // --- primary keys ---

    /// Adds a primary key. Returns true when it was not present.
    pub fn insert_primary_key(&mut self, pk: PrimaryKey) -> bool {
        self.primary_keys.insert(pk)
    }

    /// Removes a primary key. Returns true when it was present.
    pub fn remove_primary_key(&mut self, pk: PrimaryKey) -> bool {
        self.primary_keys.remove(&pk)
    }

    /// Returns true when the primary key is tracked.
    #[must_use]
    pub fn contains_primary_key(&self, pk: PrimaryKey) -> bool {
        self.primary_keys.contains(&pk)
    }

    /// All tracked primary keys.
    #[must_use]
    pub fn primary_keys(&self) -> &BTreeSet<PrimaryKey> {
        &self.primary_keys
    }

    /// Counted variant of [`Self::insert_primary_key`], used by reduced
    /// per-reference-type indexes where several owning entities project the
    /// same referenced primary key. Returns true on the first occurrence.
    pub fn insert_primary_key_counted(&mut self, pk: PrimaryKey) -> bool {
        let count = self.pk_cardinalities.entry(pk).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Counted removal; the key stays tracked until its last occurrence is
    /// gone. Returns true when the key left the index.
    pub fn remove_primary_key_counted(&mut self, pk: PrimaryKey) -> CoreResult<bool> {
        let count = self.pk_cardinalities.get_mut(&pk).ok_or_else(|| {
            CoreError::premise(format!("index {} does not track primary key {pk}", self.key))
        })?;
        *count -= 1;
        if *count == 0 {
            self.pk_cardinalities.remove(&pk);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Returns true when the counted primary key is tracked.
    #[must_use]
    pub fn contains_primary_key_counted(&self, pk: PrimaryKey) -> bool {
        self.pk_cardinalities.contains_key(&pk)
    }

    // --- languages ---

    /// Marks the entity as carrying the locale. Returns true when new.
    pub fn upsert_language(&mut self, locale: &Locale, pk: PrimaryKey) -> bool {
        self.languages.entry(locale.clone()).or_default().insert(pk)
    }

    /// Unmarks the locale for the entity. Returns true when it was present.
    pub fn remove_language(&mut self, locale: &Locale, pk: PrimaryKey) -> bool {
        let removed = self
            .languages
            .get_mut(locale)
            .is_some_and(|set| set.remove(&pk));
        if self.languages.get(locale).is_some_and(BTreeSet::is_empty) {
            self.languages.remove(locale);
        }
        removed
    }

    /// Returns true when the entity carries the locale.
    #[must_use]
    pub fn has_language(&self, locale: &Locale, pk: PrimaryKey) -> bool {
        self.languages.get(locale).is_some_and(|set| set.contains(&pk))
    }

    /// Locales tracked by this index.
    pub fn languages(&self) -> impl Iterator<Item = &Locale> {
        self.languages.keys()
    }

    // --- attribute structures ---

    /// Claims a unique value for the entity.
    pub fn insert_unique(&mut self, attribute: &AttributeKey, value: Value, pk: PrimaryKey) -> CoreResult<()> {
        self.unique
            .entry(attribute.clone())
            .or_default()
            .insert(attribute, value, pk)
    }

    /// Releases a unique value.
    pub fn remove_unique(&mut self, attribute: &AttributeKey, value: &Value, pk: PrimaryKey) -> CoreResult<()> {
        let idx = self.unique.get_mut(attribute).ok_or_else(|| {
            CoreError::premise(format!("no unique index for attribute {attribute}"))
        })?;
        idx.remove(attribute, value, pk)?;
        if idx.is_empty() {
            self.unique.remove(attribute);
        }
        Ok(())
    }

    /// Looks up the owner of a unique value.
    #[must_use]
    pub fn unique_owner(&self, attribute: &AttributeKey, value: &Value) -> Option<PrimaryKey> {
        self.unique.get(attribute).and_then(|idx| idx.get(value))
    }

    /// Indexes a filterable value.
    pub fn insert_filter(&mut self, attribute: &AttributeKey, value: &Value, pk: PrimaryKey) -> CoreResult<()> {
        self.filter
            .entry(attribute.clone())
            .or_default()
            .insert(attribute, value, pk)
    }

    /// Un-indexes a filterable value.
    pub fn remove_filter(&mut self, attribute: &AttributeKey, value: &Value, pk: PrimaryKey) -> CoreResult<()> {
        let idx = self.filter.get_mut(attribute).ok_or_else(|| {
            CoreError::premise(format!("no filter index for attribute {attribute}"))
        })?;
        idx.remove(attribute, value, pk)?;
        if idx.is_empty() {
            self.filter.remove(attribute);
        }
        Ok(())
    }

    /// Returns the entities filtered under the value.
    #[must_use]
    pub fn filtered(&self, attribute: &AttributeKey, value: &Value) -> Option<BTreeSet<PrimaryKey>> {
        self.filter.get(attribute).and_then(|idx| idx.get(value))
    }

    /// Indexes a sortable value.
    pub fn insert_sort(&mut self, attribute: &AttributeKey, value: Value, pk: PrimaryKey) -> CoreResult<()> {
        self.sort
            .entry(attribute.clone())
            .or_default()
            .insert(&attribute.to_string(), value, pk)
    }

    /// Un-indexes a sortable value.
    pub fn remove_sort(&mut self, attribute: &AttributeKey, value: &Value, pk: PrimaryKey) -> CoreResult<()> {
        let idx = self.sort.get_mut(attribute).ok_or_else(|| {
            CoreError::premise(format!("no sort index for attribute {attribute}"))
        })?;
        idx.remove(&attribute.to_string(), value, pk)?;
        if idx.is_empty() {
            self.sort.remove(attribute);
        }
        Ok(())
    }

    /// Returns the sort key of an entity.
    #[must_use]
    pub fn sort_key_of(&self, attribute: &AttributeKey, pk: PrimaryKey) -> Option<&Value> {
        self.sort.get(attribute).and_then(|idx| idx.key_of(pk))
    }

    /// Primary keys in sort order for an attribute.
    pub fn sorted_by(&self, attribute: &AttributeKey) -> Option<impl Iterator<Item = PrimaryKey> + '_> {
        self.sort.get(attribute).map(SortIndex::ordered_pks)
    }

    // --- sortable compounds ---

    /// Indexes a compound tuple.
    pub fn insert_compound(&mut self, compound: &AttributeKey, tuple: CompoundTuple, pk: PrimaryKey) -> CoreResult<()> {
        self.compounds
            .entry(compound.clone())
            .or_default()
            .insert(&compound.to_string(), tuple, pk)
    }

    /// Un-indexes a compound tuple.
    pub fn remove_compound(&mut self, compound: &AttributeKey, tuple: &CompoundTuple, pk: PrimaryKey) -> CoreResult<()> {
        let idx = self.compounds.get_mut(compound).ok_or_else(|| {
            CoreError::premise(format!("no compound index for {compound}"))
        })?;
        idx.remove(&compound.to_string(), tuple, pk)?;
        if idx.is_empty() {
            self.compounds.remove(compound);
        }
        Ok(())
    }

    /// Returns the compound tuple of an entity.
    #[must_use]
    pub fn compound_of(&self, compound: &AttributeKey, pk: PrimaryKey) -> Option<&CompoundTuple> {
        self.compounds.get(compound).and_then(|idx| idx.key_of(pk))
    }

    // --- facets, prices, hierarchy ---

    /// Records a facet occurrence.
    pub fn insert_facet(&mut self, reference: &ReferenceKey, group: Option<PrimaryKey>, owner: PrimaryKey) -> CoreResult<()> {
        self.facets.insert(reference, group, owner)
    }

    /// Removes a facet occurrence.
    pub fn remove_facet(&mut self, reference: &ReferenceKey, group: Option<PrimaryKey>, owner: PrimaryKey) -> CoreResult<()> {
        self.facets.remove(reference, group, owner)
    }

    /// Read access to the facet index.
    #[must_use]
    pub fn facets(&self) -> &FacetIndex {
        &self.facets
    }

    /// Adds a sellable price.
    pub fn insert_price(&mut self, price: IndexedPrice) -> CoreResult<()> {
        self.prices.insert(price)
    }

    /// Removes a sellable price by internal id.
    pub fn remove_price(&mut self, internal_id: u32) -> CoreResult<IndexedPrice> {
        self.prices.remove(internal_id)
    }

    /// Read access to the price index.
    #[must_use]
    pub fn prices(&self) -> &PriceIndex {
        &self.prices
    }

    /// Places an entity in the hierarchy.
    pub fn set_parent(&mut self, pk: PrimaryKey, parent: Option<PrimaryKey>) -> CoreResult<()> {
        self.hierarchy.set_parent(pk, parent)
    }

    /// Detaches an entity from the hierarchy, returning its prior parent.
    pub fn remove_from_hierarchy(&mut self, pk: PrimaryKey) -> CoreResult<Option<PrimaryKey>> {
        self.hierarchy.remove(pk)
    }

    /// Read access to the hierarchy index.
    #[must_use]
    pub fn hierarchy(&self) -> &HierarchyIndex {
        &self.hierarchy
    }

    /// Returns true when the index tracks nothing at all and can be dropped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary_keys.is_empty()
            && self.pk_cardinalities.is_empty()
            && self.languages.is_empty()
            && self.unique.is_empty()
            && self.filter.is_empty()
            && self.sort.is_empty()
            && self.compounds.is_empty()
            && self.facets.is_empty()
            && self.prices.is_empty()
            && self.hierarchy.is_empty()
    }
}
