//! Undo log for index-side changes.
//!
//! Every index operation a batch performs records one op describing exactly
//! what changed. Replaying the log in reverse applies the inverse of each op,
//! restoring the registry and catalog index to their pre-batch state.

use crate::error::CoreResult;
use crate::index::{CatalogIndex, IndexKey, IndexRegistry, IndexedPrice};
use crate::types::{AttributeKey, EntityType, Locale, PrimaryKey, ReferenceKey};
use crate::value::{CompoundTuple, Value};
use tracing::trace;

/// One recorded index-side change. Each variant carries everything needed to
/// apply its inverse without consulting containers or schemas.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UndoOp {
    IndexCreated {
        index: IndexKey,
    },
    IndexRemoved {
        index: IndexKey,
    },
    PkInserted {
        index: IndexKey,
        pk: PrimaryKey,
    },
    PkRemoved {
        index: IndexKey,
        pk: PrimaryKey,
    },
    PkCountInserted {
        index: IndexKey,
        pk: PrimaryKey,
    },
    PkCountRemoved {
        index: IndexKey,
        pk: PrimaryKey,
    },
    LanguageAdded {
        index: IndexKey,
        locale: Locale,
        pk: PrimaryKey,
    },
    LanguageRemoved {
        index: IndexKey,
        locale: Locale,
        pk: PrimaryKey,
    },
    UniqueInserted {
        index: IndexKey,
        attribute: AttributeKey,
        value: Value,
        pk: PrimaryKey,
    },
    UniqueRemoved {
        index: IndexKey,
        attribute: AttributeKey,
        value: Value,
        pk: PrimaryKey,
    },
    FilterInserted {
        index: IndexKey,
        attribute: AttributeKey,
        value: Value,
        pk: PrimaryKey,
    },
    FilterRemoved {
        index: IndexKey,
        attribute: AttributeKey,
        value: Value,
        pk: PrimaryKey,
    },
    SortInserted {
        index: IndexKey,
        attribute: AttributeKey,
        value: Value,
        pk: PrimaryKey,
    },
    SortRemoved {
        index: IndexKey,
        attribute: AttributeKey,
        value: Value,
        pk: PrimaryKey,
    },
    CompoundInserted {
        index: IndexKey,
        compound: AttributeKey,
        tuple: CompoundTuple,
        pk: PrimaryKey,
    },
    CompoundRemoved {
        index: IndexKey,
        compound: AttributeKey,
        tuple: CompoundTuple,
        pk: PrimaryKey,
    },
    FacetInserted {
        index: IndexKey,
        reference: ReferenceKey,
        group: Option<PrimaryKey>,
        pk: PrimaryKey,
    },
    FacetRemoved {
        index: IndexKey,
        reference: ReferenceKey,
        group: Option<PrimaryKey>,
        pk: PrimaryKey,
    },
    PriceInserted {
        index: IndexKey,
        price: IndexedPrice,
    },
    PriceRemoved {
        index: IndexKey,
        price: IndexedPrice,
    },
    ParentSet {
        index: IndexKey,
        pk: PrimaryKey,
        /// Placement before the change: `None` when the node was unplaced.
        previous: Option<Option<PrimaryKey>>,
    },
    ParentRemoved {
        index: IndexKey,
        pk: PrimaryKey,
        parent: Option<PrimaryKey>,
    },
    CatalogUniqueInserted {
        attribute: AttributeKey,
        value: Value,
        entity_type: EntityType,
        pk: PrimaryKey,
    },
    CatalogUniqueRemoved {
        attribute: AttributeKey,
        value: Value,
        entity_type: EntityType,
        pk: PrimaryKey,
    },
}

impl UndoOp {
    fn apply_inverse(
        self,
        indexes: &mut IndexRegistry,
        catalog: &mut CatalogIndex,
    ) -> CoreResult<()> {
        match self {
            Self::IndexCreated { index } => {
                indexes.remove(&index);
            }
            Self::IndexRemoved { index } => {
                indexes.get_or_create(&index);
            }
            Self::PkInserted { index, pk } => {
                indexes.get_or_create(&index).remove_primary_key(pk);
            }
            Self::PkRemoved { index, pk } => {
                indexes.get_or_create(&index).insert_primary_key(pk);
            }
            Self::PkCountInserted { index, pk } => {
                indexes.get_or_create(&index).remove_primary_key_counted(pk)?;
            }
            Self::PkCountRemoved { index, pk } => {
                indexes.get_or_create(&index).insert_primary_key_counted(pk);
            }
            Self::LanguageAdded { index, locale, pk } => {
                indexes.get_or_create(&index).remove_language(&locale, pk);
            }
            Self::LanguageRemoved { index, locale, pk } => {
                indexes.get_or_create(&index).upsert_language(&locale, pk);
            }
            Self::UniqueInserted {
                index,
                attribute,
                value,
                pk,
            } => indexes
                .get_or_create(&index)
                .remove_unique(&attribute, &value, pk)?,
            Self::UniqueRemoved {
                index,
                attribute,
                value,
                pk,
            } => indexes
                .get_or_create(&index)
                .insert_unique(&attribute, value, pk)?,
            Self::FilterInserted {
                index,
                attribute,
                value,
                pk,
            } => indexes
                .get_or_create(&index)
                .remove_filter(&attribute, &value, pk)?,
            Self::FilterRemoved {
                index,
                attribute,
                value,
                pk,
            } => indexes
                .get_or_create(&index)
                .insert_filter(&attribute, &value, pk)?,
            Self::SortInserted {
                index,
                attribute,
                value,
                pk,
            } => indexes
                .get_or_create(&index)
                .remove_sort(&attribute, &value, pk)?,
            Self::SortRemoved {
                index,
                attribute,
                value,
                pk,
            } => indexes
                .get_or_create(&index)
                .insert_sort(&attribute, value, pk)?,
            Self::CompoundInserted {
                index,
                compound,
                tuple,
                pk,
            } => indexes
                .get_or_create(&index)
                .remove_compound(&compound, &tuple, pk)?,
            Self::CompoundRemoved {
                index,
                compound,
                tuple,
                pk,
            } => indexes
                .get_or_create(&index)
                .insert_compound(&compound, tuple, pk)?,
            Self::FacetInserted {
                index,
                reference,
                group,
                pk,
            } => indexes
                .get_or_create(&index)
                .remove_facet(&reference, group, pk)?,
            Self::FacetRemoved {
                index,
                reference,
                group,
                pk,
            } => indexes
                .get_or_create(&index)
                .insert_facet(&reference, group, pk)?,
            Self::PriceInserted { index, price } => {
                indexes.get_or_create(&index).remove_price(price.internal_id)?;
            }
            Self::PriceRemoved { index, price } => {
                indexes.get_or_create(&index).insert_price(price)?;
            }
            Self::ParentSet {
                index,
                pk,
                previous,
            } => {
                let idx = indexes.get_or_create(&index);
                match previous {
                    Some(parent) => idx.set_parent(pk, parent)?,
                    None => {
                        idx.remove_from_hierarchy(pk)?;
                    }
                }
            }
            Self::ParentRemoved { index, pk, parent } => {
                indexes.get_or_create(&index).set_parent(pk, parent)?;
            }
            Self::CatalogUniqueInserted {
                attribute,
                value,
                entity_type,
                pk,
            } => catalog.remove_unique(&attribute, &value, &entity_type, pk)?,
            Self::CatalogUniqueRemoved {
                attribute,
                value,
                entity_type,
                pk,
            } => catalog.insert_unique(&attribute, value, &entity_type, pk)?,
        }
        Ok(())
    }
}

/// Ordered log of index-side changes of one batch.
#[derive(Debug, Default)]
pub(crate) struct UndoLog {
    ops: Vec<UndoOp>,
}

impl UndoLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, op: UndoOp) {
        self.ops.push(op);
    }

    /// Applies the inverse of every recorded op, last first.
    pub(crate) fn replay(
        self,
        indexes: &mut IndexRegistry,
        catalog: &mut CatalogIndex,
    ) -> CoreResult<()> {
        trace!(ops = self.ops.len(), "replaying undo log");
        for op in self.ops.into_iter().rev() {
            op.apply_inverse(indexes, catalog)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_restores_registry_to_pre_batch_state() {
        let mut indexes = IndexRegistry::new();
        let mut catalog = CatalogIndex::new();
        let mut log = UndoLog::new();
        let pk = PrimaryKey::new(1);
        let attr = AttributeKey::global("code");

        indexes.get_or_create(&IndexKey::Global);
        log.push(UndoOp::IndexCreated {
            index: IndexKey::Global,
        });
        indexes.get_or_create(&IndexKey::Global).insert_primary_key(pk);
        log.push(UndoOp::PkInserted {
            index: IndexKey::Global,
            pk,
        });
        indexes
            .get_or_create(&IndexKey::Global)
            .insert_unique(&attr, Value::Str("a".into()), pk)
            .unwrap();
        log.push(UndoOp::UniqueInserted {
            index: IndexKey::Global,
            attribute: attr,
            value: Value::Str("a".into()),
            pk,
        });

        log.replay(&mut indexes, &mut catalog).unwrap();
        assert!(indexes.is_empty());
        assert!(catalog.is_empty());
    }

    #[test]
    fn removed_index_is_recreated_before_its_content() {
        let mut indexes = IndexRegistry::new();
        let mut catalog = CatalogIndex::new();
        let key = IndexKey::ReferencedEntityType {
            reference_name: "brand".into(),
        };
        let pk = PrimaryKey::new(10);

        // batch removed the last pk and then dropped the emptied index
        let mut log = UndoLog::new();
        log.push(UndoOp::PkCountRemoved {
            index: key.clone(),
            pk,
        });
        log.push(UndoOp::IndexRemoved { index: key.clone() });

        log.replay(&mut indexes, &mut catalog).unwrap();
        let restored = indexes.get(&key).unwrap();
        assert!(restored.contains_primary_key_counted(pk));
    }
}
