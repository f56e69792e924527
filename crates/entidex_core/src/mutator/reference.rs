//! Reference index mutators.
//!
//! A reference touches up to three index slices: the per-type reduced index
//! (keyed by referenced primary keys), the per-instance reduced index (keyed
//! by owning primary keys, backfilled with all of the owner's data), and the
//! facet occurrences fanned out over the global and every per-instance
//! index. Reference-scoped attributes land in the per-type index under dual
//! primary key resolution and in the reference's own per-instance index.

use super::attribute::{self, AttrSource};
use super::executor::{MutationExecutor, PkResolver};
use super::hierarchy;
use super::price;
use super::undo::UndoOp;
use crate::containers::ContainerStore;
use crate::error::{CoreError, CoreResult};
use crate::index::{EntityIndex, IndexKey};
use crate::mutation::AttributeMutation;
use crate::types::{GroupReference, Locale, PrimaryKey, ReferenceKey};
use crate::value::AttributeValue;

/// Resolves the per-instance index key for a reference: hierarchical
/// referenced types get a hierarchy-node index, all others an entity index.
pub(crate) fn referenced_index_key<S: ContainerStore>(
    exec: &MutationExecutor<'_, S>,
    key: &ReferenceKey,
) -> CoreResult<IndexKey> {
    let schema = exec.entity_schema().reference_for(&key.name)?;
    Ok(if exec.schemas.is_hierarchical(&schema.referenced_type) {
        IndexKey::ReferencedHierarchyNode {
            reference: key.clone(),
        }
    } else {
        IndexKey::ReferencedEntity {
            reference: key.clone(),
        }
    })
}

/// Runs `f` for every live indexed reference's per-instance index.
pub(crate) fn for_each_reference_index<'a, S, F>(
    exec: &mut MutationExecutor<'a, S>,
    exclude: Option<&ReferenceKey>,
    mut f: F,
) -> CoreResult<()>
where
    S: ContainerStore,
    F: FnMut(&mut MutationExecutor<'a, S>, &ReferenceKey, &IndexKey) -> CoreResult<()>,
{
    let keys: Vec<ReferenceKey> = exec
        .containers
        .references_mut()
        .live()
        .map(|r| r.key.clone())
        .filter(|k| exclude.map_or(true, |e| e != k))
        .collect();
    for key in keys {
        let schema = exec.entity_schema().reference_for(&key.name)?;
        if !schema.indexed {
            continue;
        }
        let target = referenced_index_key(exec, &key)?;
        f(exec, &key, &target)?;
    }
    Ok(())
}

/// Index side of a reference insert: per-type key, per-instance backfill,
/// facet fan-out. A live reference being re-inserted is un-indexed first.
pub(crate) fn insert<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    key: &ReferenceKey,
    group: Option<&GroupReference>,
) -> CoreResult<()> {
    let schema = exec.entity_schema().reference_for(&key.name)?;
    if !schema.indexed {
        return Ok(());
    }
    let faceted = schema.faceted;
    if exec.containers.references_mut().get_live(key).is_some() {
        removal(exec, key)?;
    }

    let type_key = IndexKey::ReferencedEntityType {
        reference_name: key.name.clone(),
    };
    exec.touch_index(&type_key);
    exec.indexes
        .get_or_create(&type_key)
        .insert_primary_key_counted(key.referenced_pk);
    exec.record(UndoOp::PkCountInserted {
        index: type_key,
        pk: key.referenced_pk,
    });

    let instance_key = referenced_index_key(exec, key)?;
    index_all_existing_data(exec, &instance_key)?;

    if faceted {
        let group = group.map(|g| g.group_pk);
        facet_in(exec, &IndexKey::Global, key, group, true)?;
        facet_in(exec, &instance_key, key, group, true)?;
        for_each_reference_index(exec, Some(key), |e, _, target| {
            facet_in(e, target, key, group, true)
        })?;
    }
    Ok(())
}

/// Index side of a reference removal. The reference must still be live on
/// the container side.
pub(crate) fn removal<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    key: &ReferenceKey,
) -> CoreResult<()> {
    let schema = exec.entity_schema().reference_for(&key.name)?;
    if !schema.indexed {
        return Ok(());
    }
    let reference = exec
        .containers
        .references_mut()
        .get_live(key)
        .cloned()
        .ok_or_else(|| CoreError::ReferenceNotFound {
            name: key.name.clone(),
            referenced: key.referenced_pk.get(),
        })?;

    if schema.faceted {
        let group = reference.group.as_ref().map(|g| g.group_pk);
        facet_in(exec, &IndexKey::Global, key, group, false)?;
        for_each_reference_index(exec, Some(key), |e, _, target| {
            facet_in(e, target, key, group, false)
        })?;
    }
    remove_reference_slices(exec, key)
}

/// Tears down the per-type and per-instance slices of one reference: its
/// attributes leave the per-type index, the per-instance index loses all of
/// the owner's data, and emptied indexes are dropped.
pub(crate) fn remove_reference_slices<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    key: &ReferenceKey,
) -> CoreResult<()> {
    let provider = exec.entity_schema();
    let schema = provider.reference_for(&key.name)?;
    let reference = exec
        .containers
        .references_mut()
        .get_live(key)
        .cloned()
        .ok_or_else(|| CoreError::ReferenceNotFound {
            name: key.name.clone(),
            referenced: key.referenced_pk.get(),
        })?;

    let type_key = IndexKey::ReferencedEntityType {
        reference_name: key.name.clone(),
    };
    exec.touch_index(&type_key);
    let values: Vec<AttributeValue> = reference.live_attributes().cloned().collect();
    let resolver = PkResolver {
        owner: exec.pk,
        referenced: key.referenced_pk,
    };
    exec.with_pk_resolver(resolver, |e| {
        for value in &values {
            attribute::remove_existing_attribute(e, schema, &type_key, value)?;
        }
        Ok(())
    })?;
    exec.indexes
        .get_or_create(&type_key)
        .remove_primary_key_counted(key.referenced_pk)?;
    exec.record(UndoOp::PkCountRemoved {
        index: type_key.clone(),
        pk: key.referenced_pk,
    });

    let instance_key = referenced_index_key(exec, key)?;
    remove_all_existing_data(exec, &instance_key)?;
    drop_if_empty(exec, &instance_key);
    drop_if_empty(exec, &type_key);
    Ok(())
}

/// Index side of a group change: the facet occurrence moves between groups
/// in the global index and every per-instance index.
pub(crate) fn set_group<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    key: &ReferenceKey,
    new_group: Option<&GroupReference>,
) -> CoreResult<()> {
    let schema = exec.entity_schema().reference_for(&key.name)?;
    if !schema.faceted {
        return Ok(());
    }
    let reference = exec
        .containers
        .references_mut()
        .get_live(key)
        .cloned()
        .ok_or_else(|| CoreError::ReferenceNotFound {
            name: key.name.clone(),
            referenced: key.referenced_pk.get(),
        })?;
    let old = reference.group.as_ref().map(|g| g.group_pk);
    let new = new_group.map(|g| g.group_pk);
    if old == new {
        return Ok(());
    }
    facet_in(exec, &IndexKey::Global, key, old, false)?;
    facet_in(exec, &IndexKey::Global, key, new, true)?;
    for_each_reference_index(exec, None, |e, _, target| {
        facet_in(e, target, key, old, false)?;
        facet_in(e, target, key, new, true)
    })
}

/// Index side of a reference-scoped attribute change: the per-type index
/// under dual primary key resolution, then the reference's own per-instance
/// index.
pub(crate) fn attribute_update<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    key: &ReferenceKey,
    mutation: &AttributeMutation,
) -> CoreResult<()> {
    let provider = exec.entity_schema();
    let schema = provider.reference_for(&key.name)?;
    if !schema.indexed {
        return Ok(());
    }
    if exec.containers.references_mut().get_live(key).is_none() {
        return Err(CoreError::ReferenceNotFound {
            name: key.name.clone(),
            referenced: key.referenced_pk.get(),
        });
    }
    let type_key = IndexKey::ReferencedEntityType {
        reference_name: key.name.clone(),
    };
    let resolver = PkResolver {
        owner: exec.pk,
        referenced: key.referenced_pk,
    };
    exec.with_pk_resolver(resolver, |e| {
        attribute::apply(e, schema, &type_key, mutation, AttrSource::Reference(key), false)
    })?;
    let instance_key = referenced_index_key(exec, key)?;
    attribute::apply(
        exec,
        schema,
        &instance_key,
        mutation,
        AttrSource::Reference(key),
        true,
    )
}

/// Records or removes one facet occurrence in the target index.
pub(crate) fn facet_in<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    target: &IndexKey,
    key: &ReferenceKey,
    group: Option<PrimaryKey>,
    add: bool,
) -> CoreResult<()> {
    exec.touch_index(target);
    let owner = exec.pk;
    if add {
        exec.indexes.get_or_create(target).insert_facet(key, group, owner)?;
        exec.record(UndoOp::FacetInserted {
            index: target.clone(),
            reference: key.clone(),
            group,
            pk: owner,
        });
    } else {
        exec.indexes.get_or_create(target).remove_facet(key, group, owner)?;
        exec.record(UndoOp::FacetRemoved {
            index: target.clone(),
            reference: key.clone(),
            group,
            pk: owner,
        });
    }
    Ok(())
}

/// Backfills a fresh per-instance index with everything the owner already
/// carries: primary key, hierarchy placement, languages, entity attributes,
/// compound suites, facets of the other references, and sellable prices.
pub(crate) fn index_all_existing_data<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    target: &IndexKey,
) -> CoreResult<()> {
    exec.touch_index(target);
    let pk = exec.pk;
    if exec.indexes.get_or_create(target).insert_primary_key(pk) {
        exec.record(UndoOp::PkInserted {
            index: target.clone(),
            pk,
        });
    }
    if exec.entity_schema().with_hierarchy {
        let parent = exec.containers.body().parent;
        hierarchy::place_in(exec, target, parent)?;
    }
    let locales: Vec<Locale> = exec.containers.body().locales().into_iter().collect();
    for locale in &locales {
        if exec.indexes.get_or_create(target).upsert_language(locale, pk) {
            exec.record(UndoOp::LanguageAdded {
                index: target.clone(),
                locale: locale.clone(),
                pk,
            });
        }
    }

    let provider = exec.entity_schema();
    let values = exec.containers.entity_attribute_values();
    for value in &values {
        attribute::insert_existing_attribute(exec, provider, target, value)?;
    }
    attribute::insert_compound_suite(exec, provider, target, None, AttrSource::Entity)?;
    for locale in &locales {
        attribute::insert_compound_suite(exec, provider, target, Some(locale), AttrSource::Entity)?;
    }

    let references = exec.containers.live_references();
    for reference in &references {
        // the new reference's own facet is fanned out by the insert itself
        if target.reference() == Some(&reference.key) {
            continue;
        }
        let schema = provider.reference_for(&reference.key.name)?;
        if schema.faceted {
            let group = reference.group.as_ref().map(|g| g.group_pk);
            facet_in(exec, target, &reference.key, group, true)?;
        }
    }

    let prices = exec.containers.live_prices();
    for record in &prices {
        price::insert_existing(exec, target, record)?;
    }
    Ok(())
}

/// Removes everything the owner contributes to the target index. Mirror of
/// [`index_all_existing_data`], also used for the global index when the
/// whole entity goes away.
pub(crate) fn remove_all_existing_data<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    target: &IndexKey,
) -> CoreResult<()> {
    exec.touch_index(target);
    let pk = exec.pk;
    let provider = exec.entity_schema();

    let prices = exec.containers.live_prices();
    for record in &prices {
        price::remove_existing(exec, target, record)?;
    }

    let references = exec.containers.live_references();
    for reference in &references {
        let schema = provider.reference_for(&reference.key.name)?;
        if schema.faceted {
            let group = reference.group.as_ref().map(|g| g.group_pk);
            facet_in(exec, target, &reference.key, group, false)?;
        }
    }

    // reference-scoped attributes and compounds live only in the owning
    // reference's own per-instance index
    if let Some(own) = target.reference().cloned() {
        if let Some(reference) = references.iter().find(|r| r.key == own) {
            let schema = provider.reference_for(&own.name)?;
            let source = AttrSource::Reference(&own);
            let values: Vec<AttributeValue> = reference.live_attributes().cloned().collect();
            for value in &values {
                attribute::remove_existing_attribute(exec, schema, target, value)?;
            }
            attribute::remove_compound_suite(exec, schema, target, None, source)?;
            let locales: Vec<Locale> = exec.containers.body().locales().into_iter().collect();
            for locale in &locales {
                if exec.indexes.get_or_create(target).has_language(locale, pk) {
                    attribute::remove_compound_suite(exec, schema, target, Some(locale), source)?;
                }
            }
        }
    }

    let values = exec.containers.entity_attribute_values();
    for value in &values {
        attribute::remove_existing_attribute(exec, provider, target, value)?;
    }
    attribute::remove_compound_suite(exec, provider, target, None, AttrSource::Entity)?;
    let locales: Vec<Locale> = exec.containers.body().locales().into_iter().collect();
    for locale in &locales {
        if exec.indexes.get_or_create(target).has_language(locale, pk) {
            attribute::remove_compound_suite(
                exec,
                provider,
                target,
                Some(locale),
                AttrSource::Entity,
            )?;
        }
    }
    for locale in &locales {
        if exec.indexes.get_or_create(target).remove_language(locale, pk) {
            exec.record(UndoOp::LanguageRemoved {
                index: target.clone(),
                locale: locale.clone(),
                pk,
            });
        }
    }

    if exec.entity_schema().with_hierarchy {
        hierarchy::detach_in(exec, target)?;
    }
    if exec.indexes.get_or_create(target).remove_primary_key(pk) {
        exec.record(UndoOp::PkRemoved {
            index: target.clone(),
            pk,
        });
    }
    Ok(())
}

fn drop_if_empty<S: ContainerStore>(exec: &mut MutationExecutor<'_, S>, key: &IndexKey) {
    if exec.indexes.get(key).is_some_and(EntityIndex::is_empty) {
        exec.indexes.remove(key);
        exec.record(UndoOp::IndexRemoved { index: key.clone() });
    }
}
