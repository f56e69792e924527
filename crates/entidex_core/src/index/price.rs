//! Price index: sellable prices keyed by their internal id.

use crate::error::{CoreError, CoreResult};
use crate::types::PriceKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One indexed (sellable) price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPrice {
    /// Index-assigned internal id.
    pub internal_id: u32,
    /// Business identity of the price.
    pub key: PriceKey,
    /// Optional inner record id.
    pub inner_record_id: Option<u32>,
    /// Optional validity interval.
    pub validity: Option<(i64, i64)>,
    /// Amount without tax, in minor units.
    pub without_tax: i64,
    /// Amount with tax, in minor units.
    pub with_tax: i64,
}

/// All indexed prices of one entity index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceIndex {
    map: BTreeMap<u32, IndexedPrice>,
}

impl PriceIndex {
    /// Adds a price. Its internal id must not be taken.
    pub fn insert(&mut self, price: IndexedPrice) -> CoreResult<()> {
        if self.map.contains_key(&price.internal_id) {
            return Err(CoreError::premise(format!(
                "price index already holds internal id {}",
                price.internal_id
            )));
        }
        self.map.insert(price.internal_id, price);
        Ok(())
    }

    /// Removes a price by internal id, returning the stored record.
    pub fn remove(&mut self, internal_id: u32) -> CoreResult<IndexedPrice> {
        self.map.remove(&internal_id).ok_or_else(|| {
            CoreError::premise(format!(
                "price index does not hold internal id {internal_id}"
            ))
        })
    }

    /// Returns the stored price for the internal id.
    #[must_use]
    pub fn get(&self, internal_id: u32) -> Option<&IndexedPrice> {
        self.map.get(&internal_id)
    }

    /// Returns true when nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of indexed prices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;

    fn price(internal_id: u32) -> IndexedPrice {
        IndexedPrice {
            internal_id,
            key: PriceKey::new(internal_id, "basic", Currency::new("EUR")),
            inner_record_id: None,
            validity: None,
            without_tax: 100,
            with_tax: 121,
        }
    }

    #[test]
    fn duplicate_internal_id_breaks_premise() {
        let mut idx = PriceIndex::default();
        idx.insert(price(1)).unwrap();
        assert!(idx.insert(price(1)).is_err());
    }

    #[test]
    fn remove_returns_stored_record() {
        let mut idx = PriceIndex::default();
        idx.insert(price(7)).unwrap();
        let removed = idx.remove(7).unwrap();
        assert_eq!(removed.internal_id, 7);
        assert!(idx.is_empty());
        assert!(idx.remove(7).is_err());
    }
}
