//! Core identifier and key types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of an entity collection (e.g. `Product`, `Brand`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityType(String);

impl EntityType {
    /// Creates a new entity type name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key of an entity within its collection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PrimaryKey(u32);

impl PrimaryKey {
    /// Creates a new primary key.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A locale tag (short IETF form, e.g. `en`, `cs-CZ`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Locale(String);

impl Locale {
    /// Creates a new locale from a tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addresses one attribute value: name plus locale for localized attributes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttributeKey {
    /// Attribute name.
    pub name: String,
    /// Locale; `None` for non-localized attributes.
    pub locale: Option<Locale>,
}

impl AttributeKey {
    /// Creates a key for a non-localized attribute.
    #[must_use]
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: None,
        }
    }

    /// Creates a key for a localized attribute.
    #[must_use]
    pub fn localized(name: impl Into<String>, locale: Locale) -> Self {
        Self {
            name: name.into(),
            locale: Some(locale),
        }
    }

    /// Returns true when the key carries a locale.
    #[must_use]
    pub fn is_localized(&self) -> bool {
        self.locale.is_some()
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locale {
            Some(locale) => write!(f, "{}:{}", self.name, locale),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Addresses one associated data value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssociatedDataKey {
    /// Associated data name.
    pub name: String,
    /// Locale; `None` for non-localized associated data.
    pub locale: Option<Locale>,
}

impl AssociatedDataKey {
    /// Creates a key for non-localized associated data.
    #[must_use]
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: None,
        }
    }

    /// Creates a key for localized associated data.
    #[must_use]
    pub fn localized(name: impl Into<String>, locale: Locale) -> Self {
        Self {
            name: name.into(),
            locale: Some(locale),
        }
    }
}

impl fmt::Display for AssociatedDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locale {
            Some(locale) => write!(f, "{}:{}", self.name, locale),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Identifies one reference instance: reference name plus referenced key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceKey {
    /// Reference name as declared in the schema.
    pub name: String,
    /// Primary key of the referenced entity.
    pub referenced_pk: PrimaryKey,
}

impl ReferenceKey {
    /// Creates a new reference key.
    #[must_use]
    pub fn new(name: impl Into<String>, referenced_pk: PrimaryKey) -> Self {
        Self {
            name: name.into(),
            referenced_pk,
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.referenced_pk)
    }
}

/// Group assignment of a reference (facet grouping).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupReference {
    /// Entity type of the group.
    pub group_type: EntityType,
    /// Primary key of the group.
    pub group_pk: PrimaryKey,
}

impl GroupReference {
    /// Creates a new group reference.
    #[must_use]
    pub fn new(group_type: EntityType, group_pk: PrimaryKey) -> Self {
        Self {
            group_type,
            group_pk,
        }
    }
}

/// ISO currency code newtype.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Creates a new currency from a code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Business identity of a price: external id, price list, currency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PriceKey {
    /// External price id, unique within the price list and currency.
    pub price_id: u32,
    /// Price list name.
    pub price_list: String,
    /// Price currency.
    pub currency: Currency,
}

impl PriceKey {
    /// Creates a new price key.
    #[must_use]
    pub fn new(price_id: u32, price_list: impl Into<String>, currency: Currency) -> Self {
        Self {
            price_id,
            price_list: price_list.into(),
            currency,
        }
    }
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.price_id, self.price_list, self.currency)
    }
}

/// How prices sharing an inner record id are combined for selling.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum InnerRecordHandling {
    /// Prices are independent; no inner-record aggregation.
    #[default]
    None,
    /// Prices with the same inner record id are summed.
    Sum,
    /// Only the first occurrence per inner record id is considered.
    FirstOccurrence,
}

impl fmt::Display for InnerRecordHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Sum => write!(f, "sum"),
            Self::FirstOccurrence => write!(f, "first-occurrence"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_key_display() {
        assert_eq!(AttributeKey::global("code").to_string(), "code");
        assert_eq!(
            AttributeKey::localized("name", Locale::new("en")).to_string(),
            "name:en"
        );
    }

    #[test]
    fn reference_key_ordering_is_by_name_then_pk() {
        let a = ReferenceKey::new("brand", PrimaryKey::new(2));
        let b = ReferenceKey::new("brand", PrimaryKey::new(10));
        let c = ReferenceKey::new("category", PrimaryKey::new(1));
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn inner_record_handling_defaults_to_none() {
        assert_eq!(InnerRecordHandling::default(), InnerRecordHandling::None);
    }
}
