//! Per-batch container arena.
//!
//! Every container touched by the batch is loaded once, mutated in place, and
//! written back at commit (read-your-writes). Locale bookkeeping is derived
//! by diffing the body's locale set around each mutation.

use super::associated_data::AssociatedDataContainer;
use super::attributes::AttributesContainer;
use super::body::EntityBodyContainer;
use super::prices::{PriceRecord, PricesContainer};
use super::references::{Reference, ReferencesContainer};
use super::store::ContainerStore;
use crate::error::{CoreError, CoreResult};
use crate::mutation::{
    AssociatedDataMutation, AttributeMutation, LocalMutation, ParentMutation, PriceMutation,
    ReferenceMutation,
};
use crate::schema::{AttributeSchemaProvider, EntitySchema};
use crate::types::{AssociatedDataKey, AttributeKey, Locale, PriceKey, PrimaryKey, ReferenceKey};
use crate::value::AttributeValue;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, trace};

/// Applies the container side of local mutations for one entity.
pub struct ContainerExecutor<'a, S: ContainerStore> {
    store: &'a mut S,
    schema: &'a EntitySchema,
    pk: PrimaryKey,
    is_new: bool,
    body: EntityBodyContainer,
    global_attributes: Option<AttributesContainer>,
    localized_attributes: HashMap<Locale, AttributesContainer>,
    references: Option<ReferencesContainer>,
    prices: Option<PricesContainer>,
    associated_data: HashMap<AssociatedDataKey, AssociatedDataContainer>,
    /// Locales the batch added to the entity so far.
    pub(crate) added_locales: BTreeSet<Locale>,
    /// Locales the batch removed from the entity so far.
    pub(crate) removed_locales: BTreeSet<Locale>,
    /// Internal price ids assigned during this batch, by price key.
    pub(crate) assigned_price_ids: HashMap<PriceKey, u32>,
}

impl<'a, S: ContainerStore> ContainerExecutor<'a, S> {
    /// Creates the arena for one entity, loading its body eagerly.
    pub fn new(store: &'a mut S, schema: &'a EntitySchema, pk: PrimaryKey) -> Self {
        let loaded = store.load_body(&schema.entity_type, pk);
        let is_new = loaded.is_none();
        let body = loaded.unwrap_or_else(|| EntityBodyContainer::new(pk));
        Self {
            store,
            schema,
            pk,
            is_new,
            body,
            global_attributes: None,
            localized_attributes: HashMap::new(),
            references: None,
            prices: None,
            associated_data: HashMap::new(),
            added_locales: BTreeSet::new(),
            removed_locales: BTreeSet::new(),
            assigned_price_ids: HashMap::new(),
        }
    }

    /// The schema of the entity being mutated.
    #[must_use]
    pub fn entity_schema(&self) -> &'a EntitySchema {
        self.schema
    }

    /// True when the entity did not exist before this batch.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// The entity body.
    #[must_use]
    pub fn body(&self) -> &EntityBodyContainer {
        &self.body
    }

    /// Mutable access to the entity body.
    pub fn body_mut(&mut self) -> &mut EntityBodyContainer {
        &mut self.body
    }

    /// The attribute container for the given scope, loading it on first use.
    pub fn attributes_mut(&mut self, locale: Option<&Locale>) -> &mut AttributesContainer {
        let store = &*self.store;
        let schema = self.schema;
        let pk = self.pk;
        match locale {
            None => self.global_attributes.get_or_insert_with(|| {
                store
                    .load_attributes(&schema.entity_type, pk, None)
                    .unwrap_or_else(|| AttributesContainer::new(pk, None))
            }),
            Some(l) => self.localized_attributes.entry(l.clone()).or_insert_with(|| {
                store
                    .load_attributes(&schema.entity_type, pk, Some(l))
                    .unwrap_or_else(|| AttributesContainer::new(pk, Some(l.clone())))
            }),
        }
    }

    /// The references container, loading it on first use.
    pub fn references_mut(&mut self) -> &mut ReferencesContainer {
        let store = &*self.store;
        let schema = self.schema;
        let pk = self.pk;
        self.references.get_or_insert_with(|| {
            store
                .load_references(&schema.entity_type, pk)
                .unwrap_or_else(|| ReferencesContainer::new(pk))
        })
    }

    /// The prices container, loading it on first use.
    pub fn prices_mut(&mut self) -> &mut PricesContainer {
        let store = &*self.store;
        let schema = self.schema;
        let pk = self.pk;
        self.prices.get_or_insert_with(|| {
            store
                .load_prices(&schema.entity_type, pk)
                .unwrap_or_else(|| PricesContainer::new(pk))
        })
    }

    /// The associated data container for the key, loading it on first use.
    pub fn associated_data_mut(&mut self, key: &AssociatedDataKey) -> &mut AssociatedDataContainer {
        let store = &*self.store;
        let schema = self.schema;
        let pk = self.pk;
        self.associated_data.entry(key.clone()).or_insert_with(|| {
            store
                .load_associated_data(&schema.entity_type, pk, key)
                .unwrap_or_else(|| AssociatedDataContainer::new(pk, key.clone()))
        })
    }

    /// Current live value of an entity attribute, if any.
    pub fn existing_attribute(&mut self, key: &AttributeKey) -> Option<AttributeValue> {
        let locale = key.locale.clone();
        self.attributes_mut(locale.as_ref()).live(key).cloned()
    }

    /// Current live value of a reference-scoped attribute. The reference
    /// must exist.
    pub fn existing_reference_attribute(
        &mut self,
        reference: &ReferenceKey,
        key: &AttributeKey,
    ) -> CoreResult<Option<AttributeValue>> {
        let r = self
            .references_mut()
            .get_live(reference)
            .ok_or_else(|| CoreError::ReferenceNotFound {
                name: reference.name.clone(),
                referenced: reference.referenced_pk.get(),
            })?;
        Ok(r.live_attribute(key).cloned())
    }

    /// Snapshot of all live entity attribute values across scopes.
    pub(crate) fn entity_attribute_values(&mut self) -> Vec<AttributeValue> {
        let mut out: Vec<AttributeValue> =
            self.attributes_mut(None).live_values().cloned().collect();
        for locale in self.body.locales() {
            out.extend(self.attributes_mut(Some(&locale)).live_values().cloned());
        }
        out
    }

    /// Snapshot of all live references.
    pub(crate) fn live_references(&mut self) -> Vec<Reference> {
        self.references_mut().live().cloned().collect()
    }

    /// Snapshot of all live prices.
    pub(crate) fn live_prices(&mut self) -> Vec<PriceRecord> {
        self.prices_mut().live().cloned().collect()
    }

    /// Schedules the whole entity for removal at commit.
    pub fn mark_entity_for_removal(&mut self) {
        self.body.mark_for_removal();
    }

    /// Applies the container side of one mutation, then reconciles the
    /// batch-level locale delta from the body's locale set.
    pub fn apply(&mut self, mutation: &LocalMutation) -> CoreResult<()> {
        let before = self.body.locales();
        self.apply_inner(mutation)?;
        let after = self.body.locales();
        // symmetric cancellation keeps the delta net: a locale added and
        // removed within one batch (or the other way round) cancels out
        // instead of landing on both sides
        for locale in after.difference(&before) {
            if !self.removed_locales.remove(locale) {
                self.added_locales.insert(locale.clone());
            }
        }
        for locale in before.difference(&after) {
            if !self.added_locales.remove(locale) {
                self.removed_locales.insert(locale.clone());
            }
        }
        Ok(())
    }

    fn apply_inner(&mut self, mutation: &LocalMutation) -> CoreResult<()> {
        match mutation {
            LocalMutation::Attribute(am) => self.apply_attribute(am),
            LocalMutation::AssociatedData(am) => self.apply_associated_data(am),
            LocalMutation::Reference(rm) => self.apply_reference(rm),
            LocalMutation::Price(pm) => self.apply_price(pm),
            LocalMutation::InnerRecordHandling { handling } => {
                self.prices_mut().set_inner_record_handling(*handling);
                Ok(())
            }
            LocalMutation::Parent(pm) => {
                match pm {
                    ParentMutation::Set { parent } => self.body.set_parent(Some(*parent)),
                    ParentMutation::Remove => self.body.set_parent(None),
                }
                Ok(())
            }
        }
    }

    fn apply_attribute(&mut self, mutation: &AttributeMutation) -> CoreResult<()> {
        let schema = self.entity_schema();
        let attr = schema.attribute_for(mutation.key())?;
        let pk = self.pk;
        let key = mutation.key().clone();
        self.attributes_mut(key.locale.as_ref())
            .upsert(key.clone(), |existing| mutation.mutate(attr, existing, pk))?;
        if let Some(locale) = key.locale.clone() {
            match mutation {
                AttributeMutation::Upsert { .. } | AttributeMutation::ApplyDelta { .. } => {
                    self.body.insert_attribute_locale(locale);
                }
                AttributeMutation::Remove { .. } => self.recompute_attribute_locale(&locale),
            }
        }
        Ok(())
    }

    fn apply_associated_data(&mut self, mutation: &AssociatedDataMutation) -> CoreResult<()> {
        let schema = self.entity_schema();
        let key = mutation.key().clone();
        let data_schema = schema.associated_data_for(&key.name)?;
        if data_schema.localized != key.locale.is_some() {
            return Err(CoreError::LocaleMismatch {
                attribute: key.to_string(),
            });
        }
        match mutation {
            AssociatedDataMutation::Upsert { value, .. } => {
                self.associated_data_mut(&key).upsert(value.clone());
                self.body.insert_associated_data_key(key);
            }
            AssociatedDataMutation::Remove { .. } => {
                if !self.associated_data_mut(&key).remove() {
                    return Err(CoreError::ExistingValueMissing {
                        attribute: key.to_string(),
                        primary_key: self.pk.get(),
                    });
                }
                self.body.remove_associated_data_key(&key);
            }
        }
        Ok(())
    }

    fn apply_reference(&mut self, mutation: &ReferenceMutation) -> CoreResult<()> {
        let schema = self.entity_schema();
        let key = mutation.key().clone();
        schema.reference_for(&key.name)?;
        match mutation {
            ReferenceMutation::Insert { group, .. } => {
                self.references_mut().insert(key, group.clone());
                Ok(())
            }
            ReferenceMutation::Remove { .. } => {
                let locales = match self.references_mut().get_live(&key) {
                    Some(reference) => reference.attribute_locales(),
                    None => {
                        return Err(CoreError::ReferenceNotFound {
                            name: key.name,
                            referenced: key.referenced_pk.get(),
                        })
                    }
                };
                self.references_mut().update(&key, |r| {
                    r.exists = false;
                    r.version += 1;
                    Ok(())
                })?;
                for locale in &locales {
                    self.recompute_attribute_locale(locale);
                }
                Ok(())
            }
            ReferenceMutation::SetGroup { group, .. } => {
                self.update_live_reference(&key, |r| {
                    r.group = Some(group.clone());
                    r.version += 1;
                    Ok(())
                })
            }
            ReferenceMutation::RemoveGroup { .. } => self.update_live_reference(&key, |r| {
                r.group = None;
                r.version += 1;
                Ok(())
            }),
            ReferenceMutation::Attribute {
                mutation: attribute_mutation,
                ..
            } => {
                let reference_schema = schema.reference_for(&key.name)?;
                let attr = reference_schema.attribute_for(attribute_mutation.key())?;
                let pk = self.pk;
                let attr_key = attribute_mutation.key().clone();
                self.update_live_reference(&key, |r| {
                    r.upsert_attribute(attr_key.clone(), |existing| {
                        attribute_mutation.mutate(attr, existing, pk)
                    })
                })?;
                if let Some(locale) = attr_key.locale.clone() {
                    match attribute_mutation {
                        AttributeMutation::Upsert { .. } | AttributeMutation::ApplyDelta { .. } => {
                            self.body.insert_attribute_locale(locale);
                        }
                        AttributeMutation::Remove { .. } => {
                            self.recompute_attribute_locale(&locale);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn update_live_reference(
        &mut self,
        key: &ReferenceKey,
        f: impl FnOnce(&mut Reference) -> CoreResult<()>,
    ) -> CoreResult<()> {
        if self.references_mut().get_live(key).is_none() {
            return Err(CoreError::ReferenceNotFound {
                name: key.name.clone(),
                referenced: key.referenced_pk.get(),
            });
        }
        self.references_mut().update(key, f)?;
        Ok(())
    }

    fn apply_price(&mut self, mutation: &PriceMutation) -> CoreResult<()> {
        match mutation {
            PriceMutation::Upsert {
                key,
                inner_record_id,
                validity,
                without_tax,
                with_tax,
                sellable,
            } => {
                let assigned = self.assigned_price_ids.get(key).copied();
                let prices = self.prices_mut();
                let (version, existing_internal) = prices
                    .get(key)
                    .map_or((1, None), |p| (p.version + 1, p.internal_id));
                prices.put(PriceRecord {
                    key: key.clone(),
                    internal_id: existing_internal.or(assigned),
                    inner_record_id: *inner_record_id,
                    validity: *validity,
                    without_tax: *without_tax,
                    with_tax: *with_tax,
                    sellable: *sellable,
                    version,
                    exists: true,
                });
                Ok(())
            }
            PriceMutation::Remove { key } => {
                let prices = self.prices_mut();
                let mut record = prices
                    .get_live(key)
                    .cloned()
                    .ok_or_else(|| CoreError::PriceNotFound {
                        price_id: key.price_id,
                        price_list: key.price_list.clone(),
                        currency: key.currency.to_string(),
                    })?;
                record.version += 1;
                record.exists = false;
                prices.put(record);
                Ok(())
            }
        }
    }

    /// Drops a locale from the body when no live localized attribute (entity
    /// or reference scoped) uses it any more.
    fn recompute_attribute_locale(&mut self, locale: &Locale) {
        let used_by_entity = self
            .attributes_mut(Some(locale))
            .live_values()
            .next()
            .is_some();
        let used_by_references = self.references_mut().locale_in_use(locale);
        if !used_by_entity && !used_by_references {
            self.body.remove_attribute_locale(locale);
        }
    }

    /// Produces implicit upserts for mandatory attributes with schema
    /// defaults, or fails with the complete list of violations. Also checks
    /// reference cardinality. Entities marked for removal skip the checks;
    /// existing entities are only checked where the batch touched them.
    pub fn pop_implicit_mutations(&mut self) -> CoreResult<Vec<LocalMutation>> {
        if self.body.marked_for_removal {
            return Ok(Vec::new());
        }
        let schema = self.entity_schema();
        let entity_locales = self.body.locales();
        let mut implicit = Vec::new();
        let mut missing = Vec::new();

        for attr in schema.attributes.values().filter(|a| !a.nullable) {
            let scopes: Vec<Option<Locale>> = if attr.localized {
                entity_locales.iter().cloned().map(Some).collect()
            } else {
                vec![None]
            };
            for locale in scopes {
                if !self.must_check_scope(locale.as_ref()) {
                    continue;
                }
                let key = AttributeKey {
                    name: attr.name.clone(),
                    locale: locale.clone(),
                };
                if self.attributes_mut(locale.as_ref()).live(&key).is_none() {
                    match &attr.default {
                        Some(default) => implicit.push(LocalMutation::Attribute(
                            AttributeMutation::Upsert {
                                key,
                                value: default.clone(),
                            },
                        )),
                        None => missing.push(key.to_string()),
                    }
                }
            }
        }

        for data in schema.associated_data.values().filter(|a| !a.nullable) {
            let scopes: Vec<Option<Locale>> = if data.localized {
                entity_locales.iter().cloned().map(Some).collect()
            } else {
                vec![None]
            };
            for locale in scopes {
                let key = AssociatedDataKey {
                    name: data.name.clone(),
                    locale: locale.clone(),
                };
                let touched = self.is_new
                    || locale.as_ref().is_some_and(|l| self.added_locales.contains(l))
                    || self
                        .associated_data
                        .get(&key)
                        .is_some_and(AssociatedDataContainer::is_dirty);
                if touched && !self.body.associated_data_keys.contains(&key) {
                    missing.push(key.to_string());
                }
            }
        }

        let mut cardinality = Vec::new();
        let check_references =
            self.is_new || self.references.as_ref().is_some_and(ReferencesContainer::is_dirty);
        if check_references {
            let counts: Vec<(String, usize)> = schema
                .references
                .values()
                .map(|rs| (rs.name.clone(), self.references_mut().count_live(&rs.name)))
                .collect();
            for (name, count) in counts {
                let rs = schema.reference_for(&name)?;
                if !rs.cardinality.allows(count) {
                    cardinality.push(format!(
                        "{name}: {count} instances, allowed {}",
                        rs.cardinality
                    ));
                }
            }
        }

        if !missing.is_empty() {
            return Err(CoreError::MandatoryDataMissing { violations: missing });
        }
        if !cardinality.is_empty() {
            return Err(CoreError::CardinalityViolated {
                violations: cardinality,
            });
        }
        trace!(count = implicit.len(), "implicit mutations popped");
        Ok(implicit)
    }

    fn must_check_scope(&self, locale: Option<&Locale>) -> bool {
        if self.is_new {
            return true;
        }
        match locale {
            None => self
                .global_attributes
                .as_ref()
                .is_some_and(AttributesContainer::is_dirty),
            Some(l) => {
                self.added_locales.contains(l)
                    || self
                        .localized_attributes
                        .get(l)
                        .is_some_and(AttributesContainer::is_dirty)
            }
        }
    }

    /// Writes dirty non-empty containers back to the store and removes dirty
    /// emptied ones. For an entity marked for removal every container is
    /// deleted instead.
    pub fn commit(&mut self) -> CoreResult<()> {
        let entity_type = self.schema.entity_type.clone();
        if self.body.marked_for_removal {
            self.store.remove_body(&entity_type, self.pk);
            self.store.remove_attributes(&entity_type, self.pk, None);
            for locale in self.schema.locales.clone() {
                self.store
                    .remove_attributes(&entity_type, self.pk, Some(&locale));
            }
            self.store.remove_references(&entity_type, self.pk);
            self.store.remove_prices(&entity_type, self.pk);
            for key in self.body.associated_data_keys.clone() {
                self.store.remove_associated_data(&entity_type, self.pk, &key);
            }
            debug!(entity = %entity_type, pk = %self.pk, "entity containers removed");
            return Ok(());
        }

        if self.is_new || self.body.is_dirty() {
            let mut body = self.body.clone();
            body.prepare_for_persist();
            self.store.put_body(&entity_type, body);
        }
        if let Some(container) = &self.global_attributes {
            if container.is_dirty() {
                if container.is_empty() {
                    self.store.remove_attributes(&entity_type, self.pk, None);
                } else {
                    self.store.put_attributes(&entity_type, container.clone());
                }
            }
        }
        for (locale, container) in &self.localized_attributes {
            if container.is_dirty() {
                if container.is_empty() {
                    self.store
                        .remove_attributes(&entity_type, self.pk, Some(locale));
                } else {
                    self.store.put_attributes(&entity_type, container.clone());
                }
            }
        }
        if let Some(container) = &self.references {
            if container.is_dirty() {
                if container.is_empty() {
                    self.store.remove_references(&entity_type, self.pk);
                } else {
                    self.store.put_references(&entity_type, container.clone());
                }
            }
        }
        if let Some(container) = &self.prices {
            if container.is_dirty() {
                if container.is_empty() {
                    self.store.remove_prices(&entity_type, self.pk);
                } else {
                    self.store.put_prices(&entity_type, container.clone());
                }
            }
        }
        for (key, container) in &self.associated_data {
            if container.is_dirty() {
                if container.is_empty() {
                    self.store.remove_associated_data(&entity_type, self.pk, key);
                } else {
                    self.store
                        .put_associated_data(&entity_type, container.clone());
                }
            }
        }
        Ok(())
    }

    /// Discards the arena. Nothing was written to the store yet, so there is
    /// nothing else to do.
    pub fn rollback(&mut self) {
        trace!(entity = %self.schema.entity_type, pk = %self.pk, "container changes discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::store::InMemoryStore;
    use crate::schema::{AssociatedDataSchema, AttributeSchema, Cardinality, ReferenceSchema};
    use crate::types::EntityType;
    use crate::value::{AttributeType, Value};

    fn schema() -> EntitySchema {
        EntitySchema::new(EntityType::new("Product"))
            .with_locale(Locale::new("en"))
            .with_locale(Locale::new("cs"))
            .with_attribute(AttributeSchema::new("code", AttributeType::Str).mandatory())
            .with_attribute(
                AttributeSchema::new("visible", AttributeType::Bool)
                    .mandatory()
                    .with_default(Value::Bool(true)),
            )
            .with_attribute(AttributeSchema::new("name", AttributeType::Str).localized())
            .with_associated_data(AssociatedDataSchema::new("specs"))
            .with_reference(
                ReferenceSchema::new("brand", EntityType::new("Brand"))
                    .cardinality(Cardinality::ZeroOrOne)
                    .with_attribute(AttributeSchema::new("note", AttributeType::Str).localized()),
            )
    }

    fn upsert(name: &str, value: Value) -> LocalMutation {
        LocalMutation::Attribute(AttributeMutation::Upsert {
            key: AttributeKey::global(name),
            value,
        })
    }

    #[test]
    fn missing_mandatory_with_default_becomes_implicit_upsert() {
        let mut store = InMemoryStore::new();
        let schema = schema();
        let mut exec = ContainerExecutor::new(&mut store, &schema, PrimaryKey::new(1));
        exec.apply(&upsert("code", Value::Str("p-1".into()))).unwrap();

        let implicit = exec.pop_implicit_mutations().unwrap();
        assert_eq!(implicit.len(), 1);
        assert!(matches!(
            &implicit[0],
            LocalMutation::Attribute(AttributeMutation::Upsert { key, value: Value::Bool(true) })
                if key.name == "visible"
        ));
    }

    #[test]
    fn missing_mandatory_without_default_lists_all_violations() {
        let mut store = InMemoryStore::new();
        let schema = schema();
        let mut exec = ContainerExecutor::new(&mut store, &schema, PrimaryKey::new(1));
        // nothing set at all on a new entity
        let err = exec.pop_implicit_mutations().unwrap_err();
        match err {
            CoreError::MandatoryDataMissing { violations } => {
                assert_eq!(violations, vec!["code".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cardinality_is_verified_for_touched_references() {
        let mut store = InMemoryStore::new();
        let schema = schema();
        let mut exec = ContainerExecutor::new(&mut store, &schema, PrimaryKey::new(1));
        exec.apply(&upsert("code", Value::Str("p-1".into()))).unwrap();
        for pk in [10, 11] {
            exec.apply(&LocalMutation::Reference(ReferenceMutation::Insert {
                key: ReferenceKey::new("brand", PrimaryKey::new(pk)),
                group: None,
            }))
            .unwrap();
        }
        let err = exec.pop_implicit_mutations().unwrap_err();
        assert!(matches!(err, CoreError::CardinalityViolated { .. }));
    }

    #[test]
    fn localized_upsert_and_removal_track_locale_delta() {
        let mut store = InMemoryStore::new();
        let schema = schema();
        let en = Locale::new("en");
        let mut exec = ContainerExecutor::new(&mut store, &schema, PrimaryKey::new(1));

        exec.apply(&LocalMutation::Attribute(AttributeMutation::Upsert {
            key: AttributeKey::localized("name", en.clone()),
            value: Value::Str("Hammer".into()),
        }))
        .unwrap();
        assert!(exec.added_locales.contains(&en));

        exec.apply(&LocalMutation::Attribute(AttributeMutation::Remove {
            key: AttributeKey::localized("name", en.clone()),
        }))
        .unwrap();
        assert!(!exec.added_locales.contains(&en));
        assert!(!exec.removed_locales.contains(&en), "net change is zero");
    }

    #[test]
    fn persisted_locale_removed_and_reinserted_cancels_out() {
        let mut store = InMemoryStore::new();
        let schema = schema();
        let en = Locale::new("en");
        let pk = PrimaryKey::new(1);
        let name = AttributeKey::localized("name", en.clone());
        {
            let mut exec = ContainerExecutor::new(&mut store, &schema, pk);
            exec.apply(&upsert("code", Value::Str("p-1".into()))).unwrap();
            exec.apply(&LocalMutation::Attribute(AttributeMutation::Upsert {
                key: name.clone(),
                value: Value::Str("Hammer".into()),
            }))
            .unwrap();
            exec.commit().unwrap();
        }

        let mut exec = ContainerExecutor::new(&mut store, &schema, pk);
        exec.apply(&LocalMutation::Attribute(AttributeMutation::Remove {
            key: name.clone(),
        }))
        .unwrap();
        assert!(exec.removed_locales.contains(&en));
        exec.apply(&LocalMutation::Attribute(AttributeMutation::Upsert {
            key: name,
            value: Value::Str("Mallet".into()),
        }))
        .unwrap();
        assert!(!exec.removed_locales.contains(&en));
        assert!(!exec.added_locales.contains(&en), "net change is zero");
    }

    #[test]
    fn locale_survives_while_reference_attribute_uses_it() {
        let mut store = InMemoryStore::new();
        let schema = schema();
        let en = Locale::new("en");
        let brand = ReferenceKey::new("brand", PrimaryKey::new(10));
        let mut exec = ContainerExecutor::new(&mut store, &schema, PrimaryKey::new(1));

        exec.apply(&LocalMutation::Reference(ReferenceMutation::Insert {
            key: brand.clone(),
            group: None,
        }))
        .unwrap();
        exec.apply(&LocalMutation::Reference(ReferenceMutation::Attribute {
            key: brand.clone(),
            mutation: AttributeMutation::Upsert {
                key: AttributeKey::localized("note", en.clone()),
                value: Value::Str("official".into()),
            },
        }))
        .unwrap();
        exec.apply(&LocalMutation::Attribute(AttributeMutation::Upsert {
            key: AttributeKey::localized("name", en.clone()),
            value: Value::Str("Hammer".into()),
        }))
        .unwrap();

        // entity attribute goes away, reference attribute still holds the locale
        exec.apply(&LocalMutation::Attribute(AttributeMutation::Remove {
            key: AttributeKey::localized("name", en.clone()),
        }))
        .unwrap();
        assert!(exec.body().locales().contains(&en));

        // removing the reference releases it
        exec.apply(&LocalMutation::Reference(ReferenceMutation::Remove {
            key: brand,
        }))
        .unwrap();
        assert!(!exec.body().locales().contains(&en));
    }

    #[test]
    fn commit_persists_dirty_and_removes_emptied() {
        let mut store = InMemoryStore::new();
        let schema = schema();
        let ty = schema.entity_type.clone();
        let pk = PrimaryKey::new(1);
        {
            let mut exec = ContainerExecutor::new(&mut store, &schema, pk);
            exec.apply(&upsert("code", Value::Str("p-1".into()))).unwrap();
            exec.commit().unwrap();
        }
        assert!(store.load_body(&ty, pk).is_some());
        assert!(store.load_attributes(&ty, pk, None).is_some());

        {
            let mut exec = ContainerExecutor::new(&mut store, &schema, pk);
            assert!(!exec.is_new());
            exec.apply(&LocalMutation::Attribute(AttributeMutation::Remove {
                key: AttributeKey::global("code"),
            }))
            .unwrap();
            exec.commit().unwrap();
        }
        assert!(store.load_attributes(&ty, pk, None).is_none());
    }

    #[test]
    fn removal_marked_entity_deletes_everything_and_skips_checks() {
        let mut store = InMemoryStore::new();
        let schema = schema();
        let ty = schema.entity_type.clone();
        let pk = PrimaryKey::new(1);
        {
            let mut exec = ContainerExecutor::new(&mut store, &schema, pk);
            exec.apply(&upsert("code", Value::Str("p-1".into()))).unwrap();
            exec.commit().unwrap();
        }
        {
            let mut exec = ContainerExecutor::new(&mut store, &schema, pk);
            exec.mark_entity_for_removal();
            assert!(exec.pop_implicit_mutations().unwrap().is_empty());
            exec.commit().unwrap();
        }
        assert!(store.entity_is_absent(&ty, pk));
    }
}
