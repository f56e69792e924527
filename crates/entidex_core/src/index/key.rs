//! Index identity: global vs. reduced indexes.

use crate::types::ReferenceKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one entity index of a collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexKey {
    /// The single global index holding all entities of the collection.
    Global,
    /// Reduced index per reference name, keyed by referenced primary keys.
    ReferencedEntityType {
        /// Name of the reference.
        reference_name: String,
    },
    /// Reduced index per reference instance, keyed by owning primary keys.
    ReferencedEntity {
        /// The reference instance.
        reference: ReferenceKey,
    },
    /// Like [`IndexKey::ReferencedEntity`], used when the referenced entity
    /// type is hierarchical.
    ReferencedHierarchyNode {
        /// The reference instance.
        reference: ReferenceKey,
    },
}

impl IndexKey {
    /// Returns true for reduced (non-global) indexes.
    #[must_use]
    pub fn is_reduced(&self) -> bool {
        !matches!(self, Self::Global)
    }

    /// Returns the reference instance for per-instance reduced indexes.
    #[must_use]
    pub fn reference(&self) -> Option<&ReferenceKey> {
        match self {
            Self::ReferencedEntity { reference } | Self::ReferencedHierarchyNode { reference } => {
                Some(reference)
            }
            _ => None,
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::ReferencedEntityType { reference_name } => {
                write!(f, "ref-type:{reference_name}")
            }
            Self::ReferencedEntity { reference } => write!(f, "ref-entity:{reference}"),
            Self::ReferencedHierarchyNode { reference } => {
                write!(f, "ref-hierarchy:{reference}")
            }
        }
    }
}
