//! Entity schema model: the contract the mutators consult.
//!
//! Schemas are plain data built with a small builder-lite API; schema
//! evolution and validation of schema definitions themselves live outside
//! this crate.

use crate::error::{CoreError, CoreResult};
use crate::types::{AttributeKey, EntityType, Locale};
use crate::value::{AttributeType, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// How many reference instances of one name an entity may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// Zero or one instance.
    ZeroOrOne,
    /// Any number of instances.
    ZeroOrMore,
    /// Exactly one instance.
    ExactlyOne,
    /// At least one instance.
    OneOrMore,
}

impl Cardinality {
    /// Returns true when `count` instances satisfy this cardinality.
    #[must_use]
    pub fn allows(self, count: usize) -> bool {
        match self {
            Self::ZeroOrOne => count <= 1,
            Self::ZeroOrMore => true,
            Self::ExactlyOne => count == 1,
            Self::OneOrMore => count >= 1,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroOrOne => write!(f, "0..1"),
            Self::ZeroOrMore => write!(f, "0..*"),
            Self::ExactlyOne => write!(f, "1..1"),
            Self::OneOrMore => write!(f, "1..*"),
        }
    }
}

/// Schema of one attribute (entity-level or reference-level).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    /// Attribute name.
    pub name: String,
    /// Declared value type.
    pub value_type: AttributeType,
    /// Decimal places for `Decimal` attributes; scaling factor for coercion.
    pub decimal_places: u8,
    /// True when the attribute has one value per locale.
    pub localized: bool,
    /// False makes the attribute mandatory.
    pub nullable: bool,
    /// True when the value must be unique within the collection.
    pub unique: bool,
    /// True when the value must be unique across the whole catalog.
    pub globally_unique: bool,
    /// True when the attribute is kept in the filter index.
    pub filterable: bool,
    /// True when the attribute is kept in the sort index.
    pub sortable: bool,
    /// Default supplied for a missing mandatory value.
    pub default: Option<Value>,
}

impl AttributeSchema {
    /// Creates a nullable, non-indexed attribute schema.
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            value_type,
            decimal_places: 0,
            localized: false,
            nullable: true,
            unique: false,
            globally_unique: false,
            filterable: false,
            sortable: false,
            default: None,
        }
    }

    /// Sets the number of decimal places used for scaling.
    #[must_use]
    pub fn decimal_places(mut self, places: u8) -> Self {
        self.decimal_places = places;
        self
    }

    /// Makes the attribute localized.
    #[must_use]
    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    /// Makes the attribute mandatory.
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Makes the attribute unique within the collection.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Makes the attribute unique across the whole catalog (implies unique).
    #[must_use]
    pub fn globally_unique(mut self) -> Self {
        self.unique = true;
        self.globally_unique = true;
        self
    }

    /// Makes the attribute filterable.
    #[must_use]
    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Makes the attribute sortable.
    #[must_use]
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Sets the default value used for missing mandatory data.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Returns true when any index structure tracks this attribute.
    #[must_use]
    pub fn indexed(&self) -> bool {
        self.unique || self.filterable || self.sortable
    }
}

/// Schema of a sortable attribute compound: an ordered list of attribute
/// names whose values form one comparable tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundSchema {
    /// Compound name; the compound index is keyed by it.
    pub name: String,
    /// Names of the element attributes, in tuple order.
    pub elements: Vec<String>,
}

impl CompoundSchema {
    /// Creates a new compound schema.
    #[must_use]
    pub fn new(name: impl Into<String>, elements: Vec<String>) -> Self {
        Self {
            name: name.into(),
            elements,
        }
    }
}

/// Common lookup surface of entity and reference schemas: both own a set of
/// attributes and a set of sortable compounds over them.
pub trait AttributeSchemaProvider {
    /// Name used in schema-violation errors.
    fn provider_name(&self) -> &str;

    /// Looks up an attribute schema by name.
    fn attribute(&self, name: &str) -> Option<&AttributeSchema>;

    /// Returns all compound schemas.
    fn compounds(&self) -> &[CompoundSchema];

    /// Looks up an attribute schema, validating locale qualification of the
    /// key against the schema.
    fn attribute_for(&self, key: &AttributeKey) -> CoreResult<&AttributeSchema> {
        let schema = self.attribute(&key.name).ok_or_else(|| {
            CoreError::attribute_not_in_schema(key.name.clone(), self.provider_name().to_owned())
        })?;
        if schema.localized != key.is_localized() {
            return Err(CoreError::LocaleMismatch {
                attribute: key.to_string(),
            });
        }
        Ok(schema)
    }

    /// Returns the compounds that contain the named attribute as an element.
    fn compounds_with_attribute(&self, name: &str) -> Vec<&CompoundSchema> {
        self.compounds()
            .iter()
            .filter(|c| c.elements.iter().any(|e| e == name))
            .collect()
    }

    /// A compound is localized when any of its element attributes is.
    fn compound_localized(&self, compound: &CompoundSchema) -> bool {
        compound
            .elements
            .iter()
            .any(|e| self.attribute(e).is_some_and(|a| a.localized))
    }
}

/// Schema of one reference declared on an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSchema {
    /// Reference name.
    pub name: String,
    /// Entity type the reference points to.
    pub referenced_type: EntityType,
    /// Allowed number of instances.
    pub cardinality: Cardinality,
    /// True when reduced indexes are maintained for this reference.
    pub indexed: bool,
    /// True when the reference participates in the facet index.
    pub faceted: bool,
    /// Reference-scoped attribute schemas.
    pub attributes: BTreeMap<String, AttributeSchema>,
    /// Reference-scoped sortable compounds.
    pub compounds: Vec<CompoundSchema>,
}

impl ReferenceSchema {
    /// Creates a non-indexed reference schema with `0..*` cardinality.
    #[must_use]
    pub fn new(name: impl Into<String>, referenced_type: EntityType) -> Self {
        Self {
            name: name.into(),
            referenced_type,
            cardinality: Cardinality::ZeroOrMore,
            indexed: false,
            faceted: false,
            attributes: BTreeMap::new(),
            compounds: Vec::new(),
        }
    }

    /// Sets the cardinality.
    #[must_use]
    pub fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Makes the reference indexed.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Makes the reference faceted (implies indexed).
    #[must_use]
    pub fn faceted(mut self) -> Self {
        self.indexed = true;
        self.faceted = true;
        self
    }

    /// Adds a reference-scoped attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    /// Adds a reference-scoped compound.
    #[must_use]
    pub fn with_compound(mut self, compound: CompoundSchema) -> Self {
        self.compounds.push(compound);
        self
    }
}

impl AttributeSchemaProvider for ReferenceSchema {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    fn compounds(&self) -> &[CompoundSchema] {
        &self.compounds
    }
}

/// Schema of one associated data item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedDataSchema {
    /// Associated data name.
    pub name: String,
    /// True when there is one value per locale.
    pub localized: bool,
    /// False makes the item mandatory.
    pub nullable: bool,
}

impl AssociatedDataSchema {
    /// Creates a nullable associated data schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            localized: false,
            nullable: true,
        }
    }

    /// Makes the item localized.
    #[must_use]
    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    /// Makes the item mandatory.
    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Schema of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// The entity type this schema describes.
    pub entity_type: EntityType,
    /// True when entities of this type form a hierarchy.
    pub with_hierarchy: bool,
    /// Locales the entity type may use.
    pub locales: BTreeSet<Locale>,
    /// Entity-level attribute schemas.
    pub attributes: BTreeMap<String, AttributeSchema>,
    /// Entity-level sortable compounds.
    pub compounds: Vec<CompoundSchema>,
    /// Associated data schemas.
    pub associated_data: BTreeMap<String, AssociatedDataSchema>,
    /// Reference schemas.
    pub references: BTreeMap<String, ReferenceSchema>,
}

impl EntitySchema {
    /// Creates an empty schema for the entity type.
    #[must_use]
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            with_hierarchy: false,
            locales: BTreeSet::new(),
            attributes: BTreeMap::new(),
            compounds: Vec::new(),
            associated_data: BTreeMap::new(),
            references: BTreeMap::new(),
        }
    }

    /// Enables hierarchy placement for entities of this type.
    #[must_use]
    pub fn with_hierarchy(mut self) -> Self {
        self.with_hierarchy = true;
        self
    }

    /// Allows a locale.
    #[must_use]
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locales.insert(locale);
        self
    }

    /// Adds an entity-level attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    /// Adds an entity-level compound.
    #[must_use]
    pub fn with_compound(mut self, compound: CompoundSchema) -> Self {
        self.compounds.push(compound);
        self
    }

    /// Adds an associated data schema.
    #[must_use]
    pub fn with_associated_data(mut self, data: AssociatedDataSchema) -> Self {
        self.associated_data.insert(data.name.clone(), data);
        self
    }

    /// Adds a reference schema.
    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceSchema) -> Self {
        self.references.insert(reference.name.clone(), reference);
        self
    }

    /// Looks up a reference schema by name.
    pub fn reference_for(&self, name: &str) -> CoreResult<&ReferenceSchema> {
        self.references.get(name).ok_or_else(|| {
            CoreError::reference_not_in_schema(name.to_owned(), self.entity_type.to_string())
        })
    }

    /// Looks up an associated data schema by name.
    pub fn associated_data_for(&self, name: &str) -> CoreResult<&AssociatedDataSchema> {
        self.associated_data
            .get(name)
            .ok_or_else(|| CoreError::AssociatedDataNotInSchema {
                name: name.to_owned(),
                entity_type: self.entity_type.to_string(),
            })
    }
}

impl AttributeSchemaProvider for EntitySchema {
    fn provider_name(&self) -> &str {
        self.entity_type.as_str()
    }

    fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    fn compounds(&self) -> &[CompoundSchema] {
        &self.compounds
    }
}

/// Catalog-wide registry of entity schemas.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<EntityType, EntitySchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, replacing any previous one for the same type.
    pub fn register(&mut self, schema: EntitySchema) {
        self.schemas.insert(schema.entity_type.clone(), schema);
    }

    /// Looks up a schema by entity type.
    #[must_use]
    pub fn get(&self, entity_type: &EntityType) -> Option<&EntitySchema> {
        self.schemas.get(entity_type)
    }

    /// Looks up a schema, failing when the type is unknown.
    pub fn get_or_err(&self, entity_type: &EntityType) -> CoreResult<&EntitySchema> {
        self.get(entity_type)
            .ok_or_else(|| CoreError::schema_not_found(entity_type.to_string()))
    }

    /// Returns true when the given entity type forms a hierarchy. Unknown
    /// types are treated as non-hierarchical.
    #[must_use]
    pub fn is_hierarchical(&self, entity_type: &EntityType) -> bool {
        self.get(entity_type).is_some_and(|s| s.with_hierarchy)
    }
}
