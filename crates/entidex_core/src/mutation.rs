//! Local mutation model: the write operations a batch is made of.

use crate::error::{CoreError, CoreResult};
use crate::schema::AttributeSchema;
use crate::types::{
    AssociatedDataKey, AttributeKey, GroupReference, InnerRecordHandling, PriceKey, PrimaryKey,
    ReferenceKey,
};
use crate::value::{apply_delta, coerce, AttributeValue, Value};
use serde::{Deserialize, Serialize};

/// One fine-grained change to a single entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocalMutation {
    /// Entity-level attribute change.
    Attribute(AttributeMutation),
    /// Associated data change.
    AssociatedData(AssociatedDataMutation),
    /// Reference change (including reference-scoped attributes and groups).
    Reference(ReferenceMutation),
    /// Price change.
    Price(PriceMutation),
    /// Switch of the price inner-record handling mode.
    InnerRecordHandling {
        /// The new handling mode.
        handling: InnerRecordHandling,
    },
    /// Hierarchy placement change.
    Parent(ParentMutation),
}

/// Change to one attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeMutation {
    /// Sets or replaces the value.
    Upsert {
        /// Target attribute.
        key: AttributeKey,
        /// New value; coerced to the schema type on application.
        value: Value,
    },
    /// Removes the value. The value must exist.
    Remove {
        /// Target attribute.
        key: AttributeKey,
    },
    /// Adds a numeric delta to the existing value. The value must exist.
    ApplyDelta {
        /// Target attribute.
        key: AttributeKey,
        /// Signed delta, coerced to the schema type.
        delta: Value,
    },
}

impl AttributeMutation {
    /// Returns the attribute key the mutation targets.
    #[must_use]
    pub fn key(&self) -> &AttributeKey {
        match self {
            Self::Upsert { key, .. } | Self::Remove { key } | Self::ApplyDelta { key, .. } => key,
        }
    }

    /// Applies the mutation to the stored value, producing the next record.
    ///
    /// Upserts coerce the value to the schema type and bump the version;
    /// removal tombstones an existing live value; a delta requires a live
    /// numeric value.
    pub fn mutate(
        &self,
        schema: &AttributeSchema,
        existing: Option<&AttributeValue>,
        primary_key: PrimaryKey,
    ) -> CoreResult<AttributeValue> {
        let live = existing.filter(|v| v.exists);
        let next_version = existing.map_or(1, |v| v.version + 1);
        match self {
            Self::Upsert { key, value } => Ok(AttributeValue {
                key: key.clone(),
                value: coerce(value, key, schema.value_type, schema.decimal_places)?,
                version: next_version,
                exists: true,
            }),
            Self::Remove { key } => {
                let current = live.ok_or_else(|| CoreError::ExistingValueMissing {
                    attribute: key.to_string(),
                    primary_key: primary_key.get(),
                })?;
                Ok(AttributeValue {
                    key: key.clone(),
                    value: current.value.clone(),
                    version: next_version,
                    exists: false,
                })
            }
            Self::ApplyDelta { key, delta } => {
                let current = live.ok_or_else(|| CoreError::ExistingValueMissing {
                    attribute: key.to_string(),
                    primary_key: primary_key.get(),
                })?;
                Ok(AttributeValue {
                    key: key.clone(),
                    value: apply_delta(
                        &current.value,
                        delta,
                        key,
                        schema.value_type,
                        schema.decimal_places,
                    )?,
                    version: next_version,
                    exists: true,
                })
            }
        }
    }
}

/// Change to one associated data value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssociatedDataMutation {
    /// Sets or replaces the value.
    Upsert {
        /// Target associated data.
        key: AssociatedDataKey,
        /// New value.
        value: Value,
    },
    /// Removes the value. The value must exist.
    Remove {
        /// Target associated data.
        key: AssociatedDataKey,
    },
}

impl AssociatedDataMutation {
    /// Returns the associated data key the mutation targets.
    #[must_use]
    pub fn key(&self) -> &AssociatedDataKey {
        match self {
            Self::Upsert { key, .. } | Self::Remove { key } => key,
        }
    }
}

/// Change to one reference instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReferenceMutation {
    /// Creates the reference (or revives a removed one with fresh state).
    Insert {
        /// Target reference.
        key: ReferenceKey,
        /// Optional initial group assignment.
        group: Option<GroupReference>,
    },
    /// Removes the reference. The reference must exist.
    Remove {
        /// Target reference.
        key: ReferenceKey,
    },
    /// Assigns (or replaces) the reference's group.
    SetGroup {
        /// Target reference.
        key: ReferenceKey,
        /// The new group.
        group: GroupReference,
    },
    /// Clears the reference's group.
    RemoveGroup {
        /// Target reference.
        key: ReferenceKey,
    },
    /// Changes a reference-scoped attribute.
    Attribute {
        /// Target reference.
        key: ReferenceKey,
        /// The attribute change.
        mutation: AttributeMutation,
    },
}

impl ReferenceMutation {
    /// Returns the reference key the mutation targets.
    #[must_use]
    pub fn key(&self) -> &ReferenceKey {
        match self {
            Self::Insert { key, .. }
            | Self::Remove { key }
            | Self::SetGroup { key, .. }
            | Self::RemoveGroup { key }
            | Self::Attribute { key, .. } => key,
        }
    }
}

/// Change to one price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PriceMutation {
    /// Sets or replaces the price.
    Upsert {
        /// Business identity of the price.
        key: PriceKey,
        /// Optional inner record id for aggregated selling.
        inner_record_id: Option<u32>,
        /// Optional validity interval (inclusive timestamps).
        validity: Option<(i64, i64)>,
        /// Amount without tax, in minor units.
        without_tax: i64,
        /// Amount with tax, in minor units.
        with_tax: i64,
        /// Only sellable prices are indexed.
        sellable: bool,
    },
    /// Removes the price. The price must exist.
    Remove {
        /// Business identity of the price.
        key: PriceKey,
    },
}

impl PriceMutation {
    /// Returns the price key the mutation targets.
    #[must_use]
    pub fn key(&self) -> &PriceKey {
        match self {
            Self::Upsert { key, .. } | Self::Remove { key } => key,
        }
    }
}

/// Change to the entity's hierarchy placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParentMutation {
    /// Places the entity under the given parent.
    Set {
        /// Primary key of the parent entity.
        parent: PrimaryKey,
    },
    /// Detaches the entity from the hierarchy without touching its subtree.
    Remove,
}
