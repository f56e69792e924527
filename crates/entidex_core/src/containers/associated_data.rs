//! Associated data containers: one per associated data key.

use crate::types::{AssociatedDataKey, PrimaryKey};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// One associated data value of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedDataContainer {
    /// Primary key of the owning entity.
    pub entity_pk: PrimaryKey,
    /// Key the value is stored under.
    pub key: AssociatedDataKey,
    /// The stored value; `None` after removal.
    pub value: Option<Value>,
    /// Monotonic version.
    pub version: u32,
    dirty: bool,
}

impl AssociatedDataContainer {
    /// Creates an empty container for the key.
    #[must_use]
    pub fn new(entity_pk: PrimaryKey, key: AssociatedDataKey) -> Self {
        Self {
            entity_pk,
            key,
            value: None,
            version: 0,
            dirty: false,
        }
    }

    /// Sets or replaces the value.
    pub fn upsert(&mut self, value: Value) {
        self.value = Some(value);
        self.version += 1;
        self.dirty = true;
    }

    /// Removes the value. Returns false when there was nothing to remove.
    pub fn remove(&mut self) -> bool {
        if self.value.is_none() {
            return false;
        }
        self.value = None;
        self.version += 1;
        self.dirty = true;
        true
    }

    /// Returns true when no value is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Returns true when the container changed since load.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
