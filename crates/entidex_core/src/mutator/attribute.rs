//! Attribute index mutators.
//!
//! Everything here follows the remove-then-insert discipline of the index
//! structures: a change removes the previously indexed value first and
//! inserts the new one after. Globally unique values on the global index are
//! mirrored into the catalog index.

use super::executor::{IndexTarget, MutationExecutor};
use super::undo::UndoOp;
use crate::containers::ContainerStore;
use crate::error::{CoreError, CoreResult};
use crate::index::IndexKey;
use crate::mutation::AttributeMutation;
use crate::schema::{AttributeSchema, AttributeSchemaProvider, CompoundSchema};
use crate::types::{AttributeKey, Locale, ReferenceKey};
use crate::value::{apply_delta, coerce, AttributeValue, CompoundTuple, Value};

/// Which container the current value of an attribute is read from.
#[derive(Clone, Copy)]
pub(crate) enum AttrSource<'k> {
    /// Entity-level attribute containers.
    Entity,
    /// Attributes of one reference instance.
    Reference(&'k ReferenceKey),
}

fn existing_value<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    source: AttrSource<'_>,
    key: &AttributeKey,
) -> CoreResult<Option<Value>> {
    match source {
        AttrSource::Entity => Ok(exec.containers.existing_attribute(key).map(|v| v.value)),
        AttrSource::Reference(reference) => Ok(exec
            .containers
            .existing_reference_attribute(reference, key)?
            .map(|v| v.value)),
    }
}

/// Applies one attribute mutation to the target index.
pub(crate) fn apply<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    provider: &dyn AttributeSchemaProvider,
    target: &IndexKey,
    mutation: &AttributeMutation,
    source: AttrSource<'_>,
    update_compounds: bool,
) -> CoreResult<()> {
    match mutation {
        AttributeMutation::Upsert { key, value } => {
            execute_upsert(exec, provider, target, key, value, source, update_compounds)
        }
        AttributeMutation::Remove { key } => {
            execute_removal(exec, provider, target, key, source, update_compounds)
        }
        AttributeMutation::ApplyDelta { key, delta } => {
            execute_delta(exec, provider, target, key, delta, source, update_compounds)
        }
    }
}

/// Indexes the new value of an upsert, replacing the previously indexed one.
pub(crate) fn execute_upsert<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    provider: &dyn AttributeSchemaProvider,
    target: &IndexKey,
    key: &AttributeKey,
    value: &Value,
    source: AttrSource<'_>,
    update_compounds: bool,
) -> CoreResult<()> {
    let attr = provider.attribute_for(key)?;
    let in_compound = !provider.compounds_with_attribute(&key.name).is_empty();
    if !attr.indexed() && !in_compound {
        return Ok(());
    }
    let coerced = coerce(value, key, attr.value_type, attr.decimal_places)?;
    let existing = existing_value(exec, source, key)?;
    exec.touch_index(target);

    if attr.unique {
        if let Some(old) = &existing {
            remove_unique(exec, attr, target, key, old)?;
        }
        insert_unique(exec, attr, target, key, &coerced)?;
    }
    if attr.filterable {
        let pk = exec.pk_for(IndexTarget::Filter);
        if let Some(old) = &existing {
            exec.indexes.get_or_create(target).remove_filter(key, old, pk)?;
            exec.record(UndoOp::FilterRemoved {
                index: target.clone(),
                attribute: key.clone(),
                value: old.clone(),
                pk,
            });
        }
        exec.indexes.get_or_create(target).insert_filter(key, &coerced, pk)?;
        exec.record(UndoOp::FilterInserted {
            index: target.clone(),
            attribute: key.clone(),
            value: coerced.clone(),
            pk,
        });
    }
    if attr.sortable {
        let pk = exec.pk_for(IndexTarget::Sort);
        if let Some(old) = &existing {
            exec.indexes.get_or_create(target).remove_sort(key, old, pk)?;
            exec.record(UndoOp::SortRemoved {
                index: target.clone(),
                attribute: key.clone(),
                value: old.clone(),
                pk,
            });
        }
        exec.indexes
            .get_or_create(target)
            .insert_sort(key, coerced.clone(), pk)?;
        exec.record(UndoOp::SortInserted {
            index: target.clone(),
            attribute: key.clone(),
            value: coerced.clone(),
            pk,
        });
    }
    if update_compounds {
        update_compound_tuples(exec, provider, target, key, Some(&coerced), source)?;
    }
    Ok(())
}

/// Un-indexes the current value of the attribute. The value must exist.
pub(crate) fn execute_removal<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    provider: &dyn AttributeSchemaProvider,
    target: &IndexKey,
    key: &AttributeKey,
    source: AttrSource<'_>,
    update_compounds: bool,
) -> CoreResult<()> {
    let attr = provider.attribute_for(key)?;
    let in_compound = !provider.compounds_with_attribute(&key.name).is_empty();
    if !attr.indexed() && !in_compound {
        return Ok(());
    }
    let existing =
        existing_value(exec, source, key)?.ok_or_else(|| CoreError::ExistingValueMissing {
            attribute: key.to_string(),
            primary_key: exec.pk.get(),
        })?;
    exec.touch_index(target);

    if attr.unique {
        remove_unique(exec, attr, target, key, &existing)?;
    }
    if attr.filterable {
        let pk = exec.pk_for(IndexTarget::Filter);
        exec.indexes
            .get_or_create(target)
            .remove_filter(key, &existing, pk)?;
        exec.record(UndoOp::FilterRemoved {
            index: target.clone(),
            attribute: key.clone(),
            value: existing.clone(),
            pk,
        });
    }
    if attr.sortable {
        let pk = exec.pk_for(IndexTarget::Sort);
        exec.indexes
            .get_or_create(target)
            .remove_sort(key, &existing, pk)?;
        exec.record(UndoOp::SortRemoved {
            index: target.clone(),
            attribute: key.clone(),
            value: existing,
            pk,
        });
    }
    if update_compounds {
        update_compound_tuples(exec, provider, target, key, None, source)?;
    }
    Ok(())
}

/// Computes the post-delta value and indexes it like an upsert.
pub(crate) fn execute_delta<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    provider: &dyn AttributeSchemaProvider,
    target: &IndexKey,
    key: &AttributeKey,
    delta: &Value,
    source: AttrSource<'_>,
    update_compounds: bool,
) -> CoreResult<()> {
    let attr = provider.attribute_for(key)?;
    let existing =
        existing_value(exec, source, key)?.ok_or_else(|| CoreError::ExistingValueMissing {
            attribute: key.to_string(),
            primary_key: exec.pk.get(),
        })?;
    let next = apply_delta(&existing, delta, key, attr.value_type, attr.decimal_places)?;
    execute_upsert(exec, provider, target, key, &next, source, update_compounds)
}

/// Indexes a value that is already stored in a container, without the
/// remove-old step. Used when backfilling a fresh reduced index.
pub(crate) fn insert_existing_attribute<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    provider: &dyn AttributeSchemaProvider,
    target: &IndexKey,
    value: &AttributeValue,
) -> CoreResult<()> {
    let attr = provider.attribute_for(&value.key)?;
    if !attr.indexed() {
        return Ok(());
    }
    exec.touch_index(target);
    if attr.unique {
        insert_unique(exec, attr, target, &value.key, &value.value)?;
    }
    if attr.filterable {
        let pk = exec.pk_for(IndexTarget::Filter);
        exec.indexes
            .get_or_create(target)
            .insert_filter(&value.key, &value.value, pk)?;
        exec.record(UndoOp::FilterInserted {
            index: target.clone(),
            attribute: value.key.clone(),
            value: value.value.clone(),
            pk,
        });
    }
    if attr.sortable {
        let pk = exec.pk_for(IndexTarget::Sort);
        exec.indexes
            .get_or_create(target)
            .insert_sort(&value.key, value.value.clone(), pk)?;
        exec.record(UndoOp::SortInserted {
            index: target.clone(),
            attribute: value.key.clone(),
            value: value.value.clone(),
            pk,
        });
    }
    Ok(())
}

/// Mirror of [`insert_existing_attribute`] for index teardown.
pub(crate) fn remove_existing_attribute<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    provider: &dyn AttributeSchemaProvider,
    target: &IndexKey,
    value: &AttributeValue,
) -> CoreResult<()> {
    let attr = provider.attribute_for(&value.key)?;
    if !attr.indexed() {
        return Ok(());
    }
    exec.touch_index(target);
    if attr.unique {
        remove_unique(exec, attr, target, &value.key, &value.value)?;
    }
    if attr.filterable {
        let pk = exec.pk_for(IndexTarget::Filter);
        exec.indexes
            .get_or_create(target)
            .remove_filter(&value.key, &value.value, pk)?;
        exec.record(UndoOp::FilterRemoved {
            index: target.clone(),
            attribute: value.key.clone(),
            value: value.value.clone(),
            pk,
        });
    }
    if attr.sortable {
        let pk = exec.pk_for(IndexTarget::Sort);
        exec.indexes
            .get_or_create(target)
            .remove_sort(&value.key, &value.value, pk)?;
        exec.record(UndoOp::SortRemoved {
            index: target.clone(),
            attribute: value.key.clone(),
            value: value.value.clone(),
            pk,
        });
    }
    Ok(())
}

fn insert_unique<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    attr: &AttributeSchema,
    target: &IndexKey,
    key: &AttributeKey,
    value: &Value,
) -> CoreResult<()> {
    let pk = exec.pk_for(IndexTarget::Unique);
    exec.indexes
        .get_or_create(target)
        .insert_unique(key, value.clone(), pk)?;
    exec.record(UndoOp::UniqueInserted {
        index: target.clone(),
        attribute: key.clone(),
        value: value.clone(),
        pk,
    });
    if !attr.filterable {
        // unique attributes answer equality filters without an explicit
        // filterable flag
        exec.indexes.get_or_create(target).insert_filter(key, value, pk)?;
        exec.record(UndoOp::FilterInserted {
            index: target.clone(),
            attribute: key.clone(),
            value: value.clone(),
            pk,
        });
    }
    if attr.globally_unique && *target == IndexKey::Global {
        let entity_type = exec.entity_schema().entity_type.clone();
        exec.catalog.insert_unique(key, value.clone(), &entity_type, pk)?;
        exec.record(UndoOp::CatalogUniqueInserted {
            attribute: key.clone(),
            value: value.clone(),
            entity_type,
            pk,
        });
    }
    Ok(())
}

fn remove_unique<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    attr: &AttributeSchema,
    target: &IndexKey,
    key: &AttributeKey,
    value: &Value,
) -> CoreResult<()> {
    let pk = exec.pk_for(IndexTarget::Unique);
    exec.indexes.get_or_create(target).remove_unique(key, value, pk)?;
    exec.record(UndoOp::UniqueRemoved {
        index: target.clone(),
        attribute: key.clone(),
        value: value.clone(),
        pk,
    });
    if !attr.filterable {
        exec.indexes.get_or_create(target).remove_filter(key, value, pk)?;
        exec.record(UndoOp::FilterRemoved {
            index: target.clone(),
            attribute: key.clone(),
            value: value.clone(),
            pk,
        });
    }
    if attr.globally_unique && *target == IndexKey::Global {
        let entity_type = exec.entity_schema().entity_type.clone();
        exec.catalog.remove_unique(key, value, &entity_type, pk)?;
        exec.record(UndoOp::CatalogUniqueRemoved {
            attribute: key.clone(),
            value: value.clone(),
            entity_type,
            pk,
        });
    }
    Ok(())
}

/// Re-evaluates every compound containing the changed attribute, replacing
/// the indexed tuple with one where the changed element carries `new_value`.
///
/// Localized compounds are only maintained while the index tracks the locale
/// for the entity; until then the tuple is owed to the language-add suite.
pub(crate) fn update_compound_tuples<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    provider: &dyn AttributeSchemaProvider,
    target: &IndexKey,
    changed: &AttributeKey,
    new_value: Option<&Value>,
    source: AttrSource<'_>,
) -> CoreResult<()> {
    let compounds = provider.compounds_with_attribute(&changed.name);
    if compounds.is_empty() {
        return Ok(());
    }
    exec.touch_index(target);
    let pk = exec.pk_for(IndexTarget::Compound);
    for compound in compounds {
        // locales are enumerated from the index, not the container body: the
        // body's locale set may already reflect a locale change the index
        // only settles at commit
        let locales: Vec<Option<Locale>> = if provider.compound_localized(compound) {
            match &changed.locale {
                Some(locale) => vec![Some(locale.clone())],
                None => {
                    let index = exec.indexes.get_or_create(target);
                    let tracked: Vec<Locale> = index.languages().cloned().collect();
                    tracked
                        .into_iter()
                        .filter(|l| index.has_language(l, pk))
                        .map(Some)
                        .collect()
                }
            }
        } else {
            vec![None]
        };
        for locale in locales {
            if let Some(l) = &locale {
                if !exec.indexes.get_or_create(target).has_language(l, pk) {
                    continue;
                }
            }
            let old = tuple_of(exec, provider, compound, locale.as_ref(), None, source)?;
            let new = tuple_of(
                exec,
                provider,
                compound,
                locale.as_ref(),
                Some((changed, new_value)),
                source,
            )?;
            if old == new {
                continue;
            }
            let compound_key = AttributeKey {
                name: compound.name.clone(),
                locale,
            };
            if old.has_values() {
                exec.indexes
                    .get_or_create(target)
                    .remove_compound(&compound_key, &old, pk)?;
                exec.record(UndoOp::CompoundRemoved {
                    index: target.clone(),
                    compound: compound_key.clone(),
                    tuple: old,
                    pk,
                });
            }
            if new.has_values() {
                exec.indexes
                    .get_or_create(target)
                    .insert_compound(&compound_key, new.clone(), pk)?;
                exec.record(UndoOp::CompoundInserted {
                    index: target.clone(),
                    compound: compound_key,
                    tuple: new,
                    pk,
                });
            }
        }
    }
    Ok(())
}

/// Indexes the full suite of compound tuples for the given locale scope from
/// current container state. Tuples with no values are skipped.
pub(crate) fn insert_compound_suite<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    provider: &dyn AttributeSchemaProvider,
    target: &IndexKey,
    locale: Option<&Locale>,
    source: AttrSource<'_>,
) -> CoreResult<()> {
    let pk = exec.pk_for(IndexTarget::Compound);
    for compound in provider.compounds() {
        if provider.compound_localized(compound) != locale.is_some() {
            continue;
        }
        let tuple = tuple_of(exec, provider, compound, locale, None, source)?;
        if !tuple.has_values() {
            continue;
        }
        let compound_key = AttributeKey {
            name: compound.name.clone(),
            locale: locale.cloned(),
        };
        exec.touch_index(target);
        exec.indexes
            .get_or_create(target)
            .insert_compound(&compound_key, tuple.clone(), pk)?;
        exec.record(UndoOp::CompoundInserted {
            index: target.clone(),
            compound: compound_key,
            tuple,
            pk,
        });
    }
    Ok(())
}

/// Mirror of [`insert_compound_suite`] for language removal and teardown.
pub(crate) fn remove_compound_suite<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    provider: &dyn AttributeSchemaProvider,
    target: &IndexKey,
    locale: Option<&Locale>,
    source: AttrSource<'_>,
) -> CoreResult<()> {
    let pk = exec.pk_for(IndexTarget::Compound);
    for compound in provider.compounds() {
        if provider.compound_localized(compound) != locale.is_some() {
            continue;
        }
        let tuple = tuple_of(exec, provider, compound, locale, None, source)?;
        if !tuple.has_values() {
            continue;
        }
        let compound_key = AttributeKey {
            name: compound.name.clone(),
            locale: locale.cloned(),
        };
        exec.touch_index(target);
        exec.indexes
            .get_or_create(target)
            .remove_compound(&compound_key, &tuple, pk)?;
        exec.record(UndoOp::CompoundRemoved {
            index: target.clone(),
            compound: compound_key,
            tuple,
            pk,
        });
    }
    Ok(())
}

fn tuple_of<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    provider: &dyn AttributeSchemaProvider,
    compound: &CompoundSchema,
    locale: Option<&Locale>,
    changed: Option<(&AttributeKey, Option<&Value>)>,
    source: AttrSource<'_>,
) -> CoreResult<CompoundTuple> {
    let mut elements = Vec::with_capacity(compound.elements.len());
    for name in &compound.elements {
        let element = provider.attribute(name).ok_or_else(|| {
            CoreError::attribute_not_in_schema(name.clone(), provider.provider_name().to_owned())
        })?;
        let key = if element.localized {
            match locale {
                Some(l) => AttributeKey::localized(name.clone(), l.clone()),
                None => {
                    return Err(CoreError::premise(format!(
                        "compound {} evaluated without a locale for localized element {name}",
                        compound.name
                    )))
                }
            }
        } else {
            AttributeKey::global(name.clone())
        };
        let value = match changed {
            Some((changed_key, new_value)) if *changed_key == key => new_value.cloned(),
            _ => existing_value(exec, source, &key)?,
        };
        elements.push(value);
    }
    Ok(CompoundTuple(elements))
}
