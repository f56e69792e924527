//! Price index mutators.
//!
//! Only sellable prices are indexed. A price keeps one internal id for the
//! whole batch: the first indexing of a price key draws it from the sequence
//! and the batch ledger hands it to every later touch of the same key.

use super::executor::MutationExecutor;
use super::undo::UndoOp;
use crate::containers::{ContainerStore, PriceRecord};
use crate::error::{CoreError, CoreResult};
use crate::index::{IndexKey, IndexedPrice};
use crate::types::{InnerRecordHandling, PriceKey};

/// Index side of a price upsert in one target index: the previously indexed
/// record leaves first, the new one enters when sellable.
#[allow(clippy::too_many_arguments)]
pub(crate) fn upsert<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    target: &IndexKey,
    key: &PriceKey,
    inner_record_id: Option<u32>,
    validity: Option<(i64, i64)>,
    without_tax: i64,
    with_tax: i64,
    sellable: bool,
) -> CoreResult<()> {
    let existing = exec.containers.prices_mut().get_live(key).cloned();
    if let Some(old) = &existing {
        if old.sellable {
            remove_existing(exec, target, old)?;
        }
    }
    if !sellable {
        return Ok(());
    }
    let internal_id = match exec.containers.assigned_price_ids.get(key).copied() {
        Some(id) => id,
        None => match existing.and_then(|e| e.internal_id) {
            Some(id) => id,
            None => exec.next_price_id(),
        },
    };
    exec.containers.assigned_price_ids.insert(key.clone(), internal_id);
    insert_indexed(
        exec,
        target,
        IndexedPrice {
            internal_id,
            key: key.clone(),
            inner_record_id,
            validity,
            without_tax,
            with_tax,
        },
    )
}

/// Index side of a price removal in one target index. The price must be
/// live; non-sellable prices have nothing indexed.
pub(crate) fn removal<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    target: &IndexKey,
    key: &PriceKey,
) -> CoreResult<()> {
    let record = exec
        .containers
        .prices_mut()
        .get_live(key)
        .cloned()
        .ok_or_else(|| CoreError::PriceNotFound {
            price_id: key.price_id,
            price_list: key.price_list.clone(),
            currency: key.currency.to_string(),
        })?;
    if record.sellable {
        remove_existing(exec, target, &record)?;
    }
    Ok(())
}

/// Indexes a price record already stored in the container, used when
/// backfilling a fresh reduced index.
pub(crate) fn insert_existing<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    target: &IndexKey,
    record: &PriceRecord,
) -> CoreResult<()> {
    if !record.sellable {
        return Ok(());
    }
    let internal_id = internal_id_of(exec, record)?;
    insert_indexed(
        exec,
        target,
        IndexedPrice {
            internal_id,
            key: record.key.clone(),
            inner_record_id: record.inner_record_id,
            validity: record.validity,
            without_tax: record.without_tax,
            with_tax: record.with_tax,
        },
    )
}

/// Mirror of [`insert_existing`] for index teardown.
pub(crate) fn remove_existing<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    target: &IndexKey,
    record: &PriceRecord,
) -> CoreResult<()> {
    if !record.sellable {
        return Ok(());
    }
    let internal_id = internal_id_of(exec, record)?;
    exec.touch_index(target);
    let removed = exec.indexes.get_or_create(target).remove_price(internal_id)?;
    exec.record(UndoOp::PriceRemoved {
        index: target.clone(),
        price: removed,
    });
    Ok(())
}

/// Index side of an inner-record-handling switch: every sellable price is
/// re-indexed, reduced indexes emptied first, the global index pivoting.
pub(crate) fn change_handling<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    handling: InnerRecordHandling,
) -> CoreResult<()> {
    if exec.containers.prices_mut().inner_record_handling == handling {
        return Ok(());
    }
    let sellable: Vec<PriceRecord> = exec
        .containers
        .live_prices()
        .into_iter()
        .filter(|p| p.sellable)
        .collect();
    if sellable.is_empty() {
        return Ok(());
    }
    super::reference::for_each_reference_index(exec, None, |e, _, target| {
        for record in &sellable {
            remove_existing(e, target, record)?;
        }
        Ok(())
    })?;
    for record in &sellable {
        remove_existing(exec, &IndexKey::Global, record)?;
    }
    for record in &sellable {
        insert_existing(exec, &IndexKey::Global, record)?;
    }
    super::reference::for_each_reference_index(exec, None, |e, _, target| {
        for record in &sellable {
            insert_existing(e, target, record)?;
        }
        Ok(())
    })
}

fn internal_id_of<S: ContainerStore>(
    exec: &MutationExecutor<'_, S>,
    record: &PriceRecord,
) -> CoreResult<u32> {
    record
        .internal_id
        .or_else(|| exec.containers.assigned_price_ids.get(&record.key).copied())
        .ok_or_else(|| {
            CoreError::premise(format!(
                "price {} has no internal id assigned",
                record.key
            ))
        })
}

fn insert_indexed<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    target: &IndexKey,
    price: IndexedPrice,
) -> CoreResult<()> {
    exec.touch_index(target);
    exec.indexes.get_or_create(target).insert_price(price.clone())?;
    exec.record(UndoOp::PriceInserted {
        index: target.clone(),
        price,
    });
    Ok(())
}
