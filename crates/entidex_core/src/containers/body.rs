//! Entity body container: version, parent, locale bookkeeping.

use crate::types::{AssociatedDataKey, Locale, PrimaryKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Denormalized entity body: everything about the entity that is not an
/// attribute, price, or reference collection of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBodyContainer {
    /// Primary key of the entity.
    pub primary_key: PrimaryKey,
    /// Container version, bumped on persist.
    pub version: u32,
    /// Hierarchy parent; `None` means root or unplaced.
    pub parent: Option<PrimaryKey>,
    /// Locales in use by localized attributes (entity- or reference-scoped).
    pub attribute_locales: BTreeSet<Locale>,
    /// Keys of all associated data the entity carries.
    pub associated_data_keys: BTreeSet<AssociatedDataKey>,
    /// True when the whole entity is scheduled for removal.
    pub marked_for_removal: bool,
    dirty: bool,
}

impl EntityBodyContainer {
    /// Creates a fresh body for a new entity.
    #[must_use]
    pub fn new(primary_key: PrimaryKey) -> Self {
        Self {
            primary_key,
            version: 0,
            parent: None,
            attribute_locales: BTreeSet::new(),
            associated_data_keys: BTreeSet::new(),
            marked_for_removal: false,
            dirty: false,
        }
    }

    /// All locales the entity currently uses: attribute locales plus locales
    /// of localized associated data.
    #[must_use]
    pub fn locales(&self) -> BTreeSet<Locale> {
        let mut locales = self.attribute_locales.clone();
        locales.extend(
            self.associated_data_keys
                .iter()
                .filter_map(|k| k.locale.clone()),
        );
        locales
    }

    /// Sets the hierarchy parent.
    pub fn set_parent(&mut self, parent: Option<PrimaryKey>) {
        if self.parent != parent {
            self.parent = parent;
            self.dirty = true;
        }
    }

    /// Registers a locale as used by some localized attribute. Returns true
    /// when the locale was not present before.
    pub fn insert_attribute_locale(&mut self, locale: Locale) -> bool {
        let added = self.attribute_locales.insert(locale);
        if added {
            self.dirty = true;
        }
        added
    }

    /// Drops a locale no localized attribute uses any more. Returns true
    /// when the locale was present.
    pub fn remove_attribute_locale(&mut self, locale: &Locale) -> bool {
        let removed = self.attribute_locales.remove(locale);
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Registers an associated data key.
    pub fn insert_associated_data_key(&mut self, key: AssociatedDataKey) -> bool {
        let added = self.associated_data_keys.insert(key);
        if added {
            self.dirty = true;
        }
        added
    }

    /// Drops an associated data key.
    pub fn remove_associated_data_key(&mut self, key: &AssociatedDataKey) -> bool {
        let removed = self.associated_data_keys.remove(key);
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Schedules the whole entity for removal.
    pub fn mark_for_removal(&mut self) {
        self.marked_for_removal = true;
        self.dirty = true;
    }

    /// Returns true when the container changed since load.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bumps the version and clears the dirty flag before persisting.
    pub fn prepare_for_persist(&mut self) {
        self.version += 1;
        self.dirty = false;
    }
}
