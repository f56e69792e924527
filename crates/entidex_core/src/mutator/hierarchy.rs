//! Hierarchy index mutators.

use super::executor::MutationExecutor;
use super::undo::UndoOp;
use crate::containers::ContainerStore;
use crate::error::CoreResult;
use crate::index::IndexKey;
use crate::types::PrimaryKey;

/// Places the entity in the target index's hierarchy, `None` as a root.
pub(crate) fn place_in<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    target: &IndexKey,
    parent: Option<PrimaryKey>,
) -> CoreResult<()> {
    exec.touch_index(target);
    let pk = exec.pk;
    let previous = exec.indexes.get_or_create(target).hierarchy().placement(pk);
    if previous == Some(parent) {
        return Ok(());
    }
    exec.indexes.get_or_create(target).set_parent(pk, parent)?;
    exec.record(UndoOp::ParentSet {
        index: target.clone(),
        pk,
        previous,
    });
    Ok(())
}

/// Detaches the entity from the target index's hierarchy, if placed.
pub(crate) fn detach_in<S: ContainerStore>(
    exec: &mut MutationExecutor<'_, S>,
    target: &IndexKey,
) -> CoreResult<()> {
    let pk = exec.pk;
    if exec
        .indexes
        .get_or_create(target)
        .hierarchy()
        .placement(pk)
        .is_some()
    {
        exec.touch_index(target);
        let parent = exec.indexes.get_or_create(target).remove_from_hierarchy(pk)?;
        exec.record(UndoOp::ParentRemoved {
            index: target.clone(),
            pk,
            parent,
        });
    }
    Ok(())
}
