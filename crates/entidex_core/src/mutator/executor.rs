//! Batch executor: applies local mutations to containers and indexes.
//!
//! Per mutation the index side runs first, against pre-mutation container
//! state, then the container side. The executor owns the batch's undo log
//! and the primary key resolution for reference-scoped attribute indexing.

use super::attribute::{self, AttrSource};
use super::hierarchy;
use super::price;
use super::reference;
use super::undo::{UndoLog, UndoOp};
use crate::config::BatchOptions;
use crate::containers::{ContainerExecutor, ContainerStore};
use crate::error::{CoreError, CoreResult};
use crate::index::{CatalogIndex, IndexKey, IndexRegistry};
use crate::mutation::{LocalMutation, ParentMutation, PriceMutation, ReferenceMutation};
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::types::{EntityType, Locale, PrimaryKey};
use std::collections::BTreeSet;
use tracing::debug;

/// Which index structure a primary key is being resolved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IndexTarget {
    Unique,
    Filter,
    Sort,
    Compound,
}

/// Dual primary key resolution for reduced per-reference-type indexes.
///
/// Unique and filter structures answer "which referenced entities", so they
/// index the referenced primary key; sort and compound structures order the
/// owning entities, so they index the owner.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PkResolver {
    pub owner: PrimaryKey,
    pub referenced: PrimaryKey,
}

impl PkResolver {
    fn resolve(&self, target: IndexTarget) -> PrimaryKey {
        match target {
            IndexTarget::Sort | IndexTarget::Compound => self.owner,
            IndexTarget::Unique | IndexTarget::Filter => self.referenced,
        }
    }
}

/// Applies one batch of local mutations for one entity: containers, entity
/// indexes, and the catalog index, with optional undo on failure.
pub struct MutationExecutor<'a, S: ContainerStore> {
    pub(crate) containers: ContainerExecutor<'a, S>,
    pub(crate) indexes: &'a mut IndexRegistry,
    pub(crate) catalog: &'a mut CatalogIndex,
    pub(crate) schemas: &'a SchemaRegistry,
    pub(crate) pk: PrimaryKey,
    undo: Option<UndoLog>,
    resolver: Vec<PkResolver>,
    touched: BTreeSet<IndexKey>,
    price_sequence: &'a mut u32,
    primed: bool,
}

impl<'a, S: ContainerStore> MutationExecutor<'a, S> {
    /// Creates the executor for one entity of the batch.
    pub fn new(
        store: &'a mut S,
        schemas: &'a SchemaRegistry,
        indexes: &'a mut IndexRegistry,
        catalog: &'a mut CatalogIndex,
        entity_type: &EntityType,
        pk: PrimaryKey,
        price_sequence: &'a mut u32,
        options: BatchOptions,
    ) -> CoreResult<Self> {
        let schema = schemas.get_or_err(entity_type)?;
        let containers = ContainerExecutor::new(store, schema, pk);
        Ok(Self {
            containers,
            indexes,
            catalog,
            schemas,
            pk,
            undo: options.undo_on_error.then(UndoLog::new),
            resolver: Vec::new(),
            touched: BTreeSet::new(),
            price_sequence,
            primed: false,
        })
    }

    /// The schema of the entity being mutated.
    #[must_use]
    pub fn entity_schema(&self) -> &'a EntitySchema {
        self.containers.entity_schema()
    }

    /// Resolves the primary key to index for the given structure, honoring
    /// the innermost active resolver.
    pub(crate) fn pk_for(&self, target: IndexTarget) -> PrimaryKey {
        self.resolver
            .last()
            .map_or(self.pk, |resolver| resolver.resolve(target))
    }

    /// Runs `f` with the resolver active, restoring the previous one after.
    pub(crate) fn with_pk_resolver<T>(
        &mut self,
        resolver: PkResolver,
        f: impl FnOnce(&mut Self) -> CoreResult<T>,
    ) -> CoreResult<T> {
        self.resolver.push(resolver);
        let result = f(self);
        self.resolver.pop();
        result
    }

    /// Records an undo op when undo is enabled.
    pub(crate) fn record(&mut self, op: UndoOp) {
        if let Some(undo) = &mut self.undo {
            undo.push(op);
        }
    }

    /// Ensures the index exists and marks it touched by this batch.
    pub(crate) fn touch_index(&mut self, key: &IndexKey) {
        if !self.indexes.contains(key) {
            self.indexes.get_or_create(key);
            self.record(UndoOp::IndexCreated { index: key.clone() });
        }
        self.touched.insert(key.clone());
    }

    /// Draws the next internal price id.
    pub(crate) fn next_price_id(&mut self) -> u32 {
        *self.price_sequence += 1;
        *self.price_sequence
    }

    /// Seeds the global index with the entity before its first index-side
    /// change: primary key, non-localized compound suite, and the root
    /// hierarchy placement for hierarchical collections.
    fn ensure_primed(&mut self) -> CoreResult<()> {
        if self.primed {
            return Ok(());
        }
        self.primed = true;
        self.touch_index(&IndexKey::Global);
        let pk = self.pk;
        if self.indexes.get_or_create(&IndexKey::Global).insert_primary_key(pk) {
            self.record(UndoOp::PkInserted {
                index: IndexKey::Global,
                pk,
            });
            let provider = self.entity_schema();
            attribute::insert_compound_suite(
                self,
                provider,
                &IndexKey::Global,
                None,
                AttrSource::Entity,
            )?;
            if self.entity_schema().with_hierarchy {
                let parent = self.containers.body().parent;
                hierarchy::place_in(self, &IndexKey::Global, parent)?;
            }
        }
        Ok(())
    }

    /// Applies one local mutation: index side first, containers after.
    pub fn apply_mutation(&mut self, mutation: &LocalMutation) -> CoreResult<()> {
        self.ensure_primed()?;
        self.apply_index_side(mutation)?;
        self.containers.apply(mutation)
    }

    /// Applies a batch of mutations, then drains implicit mutations until
    /// none are produced.
    pub fn apply_batch(&mut self, mutations: &[LocalMutation]) -> CoreResult<()> {
        for mutation in mutations {
            self.apply_mutation(mutation)?;
        }
        loop {
            let implicit = self.containers.pop_implicit_mutations()?;
            if implicit.is_empty() {
                return Ok(());
            }
            for mutation in &implicit {
                self.apply_mutation(mutation)?;
            }
        }
    }

    fn apply_index_side(&mut self, mutation: &LocalMutation) -> CoreResult<()> {
        match mutation {
            LocalMutation::Attribute(am) => {
                self.apply_entity_attribute(&IndexKey::Global, am)?;
                reference::for_each_reference_index(self, None, |e, _, target| {
                    e.apply_entity_attribute(target, am)
                })
            }
            LocalMutation::AssociatedData(_) => Ok(()),
            LocalMutation::Reference(rm) => match rm {
                ReferenceMutation::Insert { key, group } => {
                    reference::insert(self, key, group.as_ref())
                }
                ReferenceMutation::Remove { key } => reference::removal(self, key),
                ReferenceMutation::SetGroup { key, group } => {
                    reference::set_group(self, key, Some(group))
                }
                ReferenceMutation::RemoveGroup { key } => reference::set_group(self, key, None),
                ReferenceMutation::Attribute { key, mutation } => {
                    reference::attribute_update(self, key, mutation)
                }
            },
            LocalMutation::Price(pm) => match pm {
                PriceMutation::Upsert {
                    key,
                    inner_record_id,
                    validity,
                    without_tax,
                    with_tax,
                    sellable,
                } => {
                    price::upsert(
                        self,
                        &IndexKey::Global,
                        key,
                        *inner_record_id,
                        *validity,
                        *without_tax,
                        *with_tax,
                        *sellable,
                    )?;
                    reference::for_each_reference_index(self, None, |e, _, target| {
                        price::upsert(
                            e,
                            target,
                            key,
                            *inner_record_id,
                            *validity,
                            *without_tax,
                            *with_tax,
                            *sellable,
                        )
                    })
                }
                PriceMutation::Remove { key } => {
                    reference::for_each_reference_index(self, None, |e, _, target| {
                        price::removal(e, target, key)
                    })?;
                    price::removal(self, &IndexKey::Global, key)
                }
            },
            LocalMutation::InnerRecordHandling { handling } => {
                price::change_handling(self, *handling)
            }
            LocalMutation::Parent(pm) => {
                if !self.entity_schema().with_hierarchy {
                    return Err(CoreError::HierarchyNotSupported {
                        entity_type: self.entity_schema().entity_type.to_string(),
                    });
                }
                let parent = match pm {
                    ParentMutation::Set { parent } => Some(*parent),
                    ParentMutation::Remove => None,
                };
                hierarchy::place_in(self, &IndexKey::Global, parent)?;
                reference::for_each_reference_index(self, None, |e, _, target| {
                    hierarchy::place_in(e, target, parent)
                })
            }
        }
    }

    fn apply_entity_attribute(
        &mut self,
        target: &IndexKey,
        mutation: &crate::mutation::AttributeMutation,
    ) -> CoreResult<()> {
        let provider = self.entity_schema();
        attribute::apply(self, provider, target, mutation, AttrSource::Entity, true)
    }

    /// Schedules the whole entity for removal at commit. The entity must
    /// exist.
    pub fn remove_entity(&mut self) -> CoreResult<()> {
        if self.containers.is_new() {
            return Err(CoreError::premise(format!(
                "entity {} of {} does not exist and cannot be removed",
                self.pk,
                self.entity_schema().entity_type
            )));
        }
        self.ensure_primed()?;
        self.containers.mark_entity_for_removal();
        Ok(())
    }

    /// Produces the implicit mutations owed by the batch so far. Callers
    /// using [`Self::apply_batch`] never need this directly.
    pub fn pop_implicit_mutations(&mut self) -> CoreResult<Vec<LocalMutation>> {
        self.containers.pop_implicit_mutations()
    }

    /// Commits containers and indexes. On failure every recorded index-side
    /// change is undone before the error is returned.
    pub fn commit(mut self) -> CoreResult<()> {
        match self.commit_inner() {
            Ok(()) => Ok(()),
            Err(error) => {
                self.undo_changes()?;
                Err(error)
            }
        }
    }

    fn commit_inner(&mut self) -> CoreResult<()> {
        if self.containers.body().marked_for_removal {
            self.remove_entity_from_indexes()?;
        } else {
            self.finalize_locales()?;
        }
        self.containers.commit()?;
        // emptied reduced indexes the batch touched are dropped; the commit
        // succeeded, so no undo record is owed for them
        let touched: Vec<IndexKey> = self.touched.iter().cloned().collect();
        for key in touched {
            if key.is_reduced()
                && self
                    .indexes
                    .get(&key)
                    .is_some_and(crate::index::EntityIndex::is_empty)
            {
                self.indexes.remove(&key);
            }
        }
        debug!(entity = %self.entity_schema().entity_type, pk = %self.pk, "batch committed");
        Ok(())
    }

    /// Discards the batch: index-side changes are undone, container changes
    /// dropped.
    pub fn rollback(mut self) -> CoreResult<()> {
        self.undo_changes()
    }

    fn undo_changes(&mut self) -> CoreResult<()> {
        if let Some(undo) = self.undo.take() {
            undo.replay(self.indexes, self.catalog)?;
        }
        self.containers.rollback();
        Ok(())
    }

    /// Settles the batch's locale delta: languages and localized compound
    /// suites enter or leave the global index and every live per-instance
    /// index.
    fn finalize_locales(&mut self) -> CoreResult<()> {
        let added: Vec<Locale> = self.containers.added_locales.iter().cloned().collect();
        let removed: Vec<Locale> = self.containers.removed_locales.iter().cloned().collect();
        if added.is_empty() && removed.is_empty() {
            return Ok(());
        }
        self.ensure_primed()?;
        for locale in &added {
            self.language_in(&IndexKey::Global, locale, true)?;
            reference::for_each_reference_index(self, None, |e, _, target| {
                e.language_in(target, locale, true)
            })?;
        }
        for locale in &removed {
            self.language_in(&IndexKey::Global, locale, false)?;
            reference::for_each_reference_index(self, None, |e, _, target| {
                e.language_in(target, locale, false)
            })?;
        }
        Ok(())
    }

    /// Adds or removes one language for the entity in the target index,
    /// together with its localized compound suites. Per-instance indexes
    /// also carry the suites of their own reference.
    pub(crate) fn language_in(
        &mut self,
        target: &IndexKey,
        locale: &Locale,
        add: bool,
    ) -> CoreResult<()> {
        self.touch_index(target);
        let pk = self.pk;
        if add {
            if self.indexes.get_or_create(target).upsert_language(locale, pk) {
                self.record(UndoOp::LanguageAdded {
                    index: target.clone(),
                    locale: locale.clone(),
                    pk,
                });
                self.insert_locale_suites(target, locale)?;
            }
        } else if self.indexes.get_or_create(target).has_language(locale, pk) {
            self.remove_locale_suites(target, locale)?;
            self.indexes.get_or_create(target).remove_language(locale, pk);
            self.record(UndoOp::LanguageRemoved {
                index: target.clone(),
                locale: locale.clone(),
                pk,
            });
        }
        Ok(())
    }

    fn insert_locale_suites(&mut self, target: &IndexKey, locale: &Locale) -> CoreResult<()> {
        let provider = self.entity_schema();
        attribute::insert_compound_suite(self, provider, target, Some(locale), AttrSource::Entity)?;
        if let Some(own) = target.reference().cloned() {
            let schema = provider.reference_for(&own.name)?;
            attribute::insert_compound_suite(
                self,
                schema,
                target,
                Some(locale),
                AttrSource::Reference(&own),
            )?;
        }
        Ok(())
    }

    fn remove_locale_suites(&mut self, target: &IndexKey, locale: &Locale) -> CoreResult<()> {
        let provider = self.entity_schema();
        attribute::remove_compound_suite(self, provider, target, Some(locale), AttrSource::Entity)?;
        if let Some(own) = target.reference().cloned() {
            let schema = provider.reference_for(&own.name)?;
            attribute::remove_compound_suite(
                self,
                schema,
                target,
                Some(locale),
                AttrSource::Reference(&own),
            )?;
        }
        Ok(())
    }

    /// Tears down the entity's contribution to every index it appears in.
    /// Each live indexed reference's slices go first, the global index last,
    /// so no cross-index fan-out touches an already dropped index.
    fn remove_entity_from_indexes(&mut self) -> CoreResult<()> {
        let references = self.containers.live_references();
        for r in &references {
            let schema = self.entity_schema().reference_for(&r.key.name)?;
            if !schema.indexed {
                continue;
            }
            reference::remove_reference_slices(self, &r.key)?;
        }
        reference::remove_all_existing_data(self, &IndexKey::Global)?;
        debug!(entity = %self.entity_schema().entity_type, pk = %self.pk, "entity removed from indexes");
        Ok(())
    }
}
