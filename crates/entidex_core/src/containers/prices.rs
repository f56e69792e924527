//! Prices container: every price of one entity plus the handling mode.

use crate::types::{InnerRecordHandling, PriceKey, PrimaryKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Business identity of the price.
    pub key: PriceKey,
    /// Index-assigned internal id; stable across upserts of the same key.
    pub internal_id: Option<u32>,
    /// Optional inner record id for aggregated selling.
    pub inner_record_id: Option<u32>,
    /// Optional validity interval.
    pub validity: Option<(i64, i64)>,
    /// Amount without tax, in minor units.
    pub without_tax: i64,
    /// Amount with tax, in minor units.
    pub with_tax: i64,
    /// Only sellable prices are indexed.
    pub sellable: bool,
    /// Monotonic version.
    pub version: u32,
    /// False when the price has been removed.
    pub exists: bool,
}

/// All prices of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricesContainer {
    /// Primary key of the owning entity.
    pub entity_pk: PrimaryKey,
    /// Inner-record handling mode applied to all prices of the entity.
    pub inner_record_handling: InnerRecordHandling,
    prices: BTreeMap<PriceKey, PriceRecord>,
    /// Container version, bumped when the handling mode changes.
    pub version: u32,
    dirty: bool,
}

impl PricesContainer {
    /// Creates an empty container with `None` handling.
    #[must_use]
    pub fn new(entity_pk: PrimaryKey) -> Self {
        Self {
            entity_pk,
            inner_record_handling: InnerRecordHandling::None,
            prices: BTreeMap::new(),
            version: 0,
            dirty: false,
        }
    }

    /// Returns the stored price record, tombstones included.
    #[must_use]
    pub fn get(&self, key: &PriceKey) -> Option<&PriceRecord> {
        self.prices.get(key)
    }

    /// Returns the live price record.
    #[must_use]
    pub fn get_live(&self, key: &PriceKey) -> Option<&PriceRecord> {
        self.get(key).filter(|p| p.exists)
    }

    /// Replaces the record for `key`.
    pub fn put(&mut self, record: PriceRecord) {
        self.prices.insert(record.key.clone(), record);
        self.dirty = true;
    }

    /// Iterates live prices.
    pub fn live(&self) -> impl Iterator<Item = &PriceRecord> {
        self.prices.values().filter(|p| p.exists)
    }

    /// Switches the handling mode. Returns the previous mode.
    pub fn set_inner_record_handling(&mut self, handling: InnerRecordHandling) -> InnerRecordHandling {
        let previous = self.inner_record_handling;
        if previous != handling {
            self.inner_record_handling = handling;
            self.version += 1;
            self.dirty = true;
        }
        previous
    }

    /// Returns true when no live price remains and the handling is `None`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live().next().is_none()
            && self.inner_record_handling == InnerRecordHandling::None
    }

    /// Returns true when the container changed since load.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
