//! Error types for the entidex write-path core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while applying entity mutations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Schema has no definition for the requested entity type.
    #[error("schema not found for entity type: {entity_type}")]
    SchemaNotFound {
        /// The unknown entity type.
        entity_type: String,
    },

    /// Attribute is not defined by the schema that was consulted.
    #[error("attribute not in schema: {name} (on {entity_type})")]
    AttributeNotInSchema {
        /// Name of the attribute.
        name: String,
        /// Entity type or reference whose schema was consulted.
        entity_type: String,
    },

    /// Reference is not defined by the entity schema.
    #[error("reference not in schema: {name} (on {entity_type})")]
    ReferenceNotInSchema {
        /// Name of the reference.
        name: String,
        /// Entity type whose schema was consulted.
        entity_type: String,
    },

    /// Associated data is not defined by the entity schema.
    #[error("associated data not in schema: {name} (on {entity_type})")]
    AssociatedDataNotInSchema {
        /// Name of the associated data.
        name: String,
        /// Entity type whose schema was consulted.
        entity_type: String,
    },

    /// Value does not match the attribute's declared type.
    #[error("invalid value type for attribute {attribute}: expected {expected}, got {actual}")]
    InvalidValueType {
        /// Attribute whose schema rejected the value.
        attribute: String,
        /// Declared type name.
        expected: &'static str,
        /// Actual value type name.
        actual: &'static str,
    },

    /// Localized attribute addressed without a locale, or vice versa.
    #[error("locale mismatch for attribute {attribute}: localized schemas require a locale-qualified key")]
    LocaleMismatch {
        /// Attribute whose key and schema disagree.
        attribute: String,
    },

    /// One or more mandatory attributes or associated data are missing.
    #[error("mandatory data missing: {}", violations.join(", "))]
    MandatoryDataMissing {
        /// Complete list of violations, one description per missing datum.
        violations: Vec<String>,
    },

    /// One or more references violate their declared cardinality.
    #[error("reference cardinality violated: {}", violations.join(", "))]
    CardinalityViolated {
        /// Complete list of violations, one description per reference.
        violations: Vec<String>,
    },

    /// Unique attribute value is already taken by another entity.
    #[error("unique constraint violated on {attribute}: value already used by primary key {existing}")]
    UniqueConstraintViolated {
        /// The unique attribute.
        attribute: String,
        /// Primary key that already owns the value.
        existing: u32,
        /// Primary key that attempted the insert.
        incoming: u32,
    },

    /// Removal or delta targeted an attribute value that does not exist.
    #[error("existing value missing for attribute {attribute} on primary key {primary_key}")]
    ExistingValueMissing {
        /// The attribute addressed by the mutation.
        attribute: String,
        /// Primary key of the entity.
        primary_key: u32,
    },

    /// Mutation targeted a reference that does not exist on the entity.
    #[error("reference not found: {name} to primary key {referenced}")]
    ReferenceNotFound {
        /// Name of the reference.
        name: String,
        /// Referenced primary key.
        referenced: u32,
    },

    /// Removal targeted a price that does not exist on the entity.
    #[error("price not found: id {price_id} in list {price_list} ({currency})")]
    PriceNotFound {
        /// External price id.
        price_id: u32,
        /// Price list name.
        price_list: String,
        /// Currency code.
        currency: String,
    },

    /// Hierarchy placement on an entity type without hierarchy support.
    #[error("hierarchy not supported by entity type: {entity_type}")]
    HierarchyNotSupported {
        /// The non-hierarchical entity type.
        entity_type: String,
    },

    /// Internal consistency premise was broken.
    #[error("premise violated: {message}")]
    Premise {
        /// Description of the broken premise.
        message: String,
    },
}

impl CoreError {
    /// Creates a premise violation error.
    pub fn premise(message: impl Into<String>) -> Self {
        Self::Premise {
            message: message.into(),
        }
    }

    /// Creates a schema-not-found error.
    pub fn schema_not_found(entity_type: impl Into<String>) -> Self {
        Self::SchemaNotFound {
            entity_type: entity_type.into(),
        }
    }

    /// Creates an attribute-not-in-schema error.
    pub fn attribute_not_in_schema(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self::AttributeNotInSchema {
            name: name.into(),
            entity_type: entity_type.into(),
        }
    }

    /// Creates a reference-not-in-schema error.
    pub fn reference_not_in_schema(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self::ReferenceNotInSchema {
            name: name.into(),
            entity_type: entity_type.into(),
        }
    }
}
