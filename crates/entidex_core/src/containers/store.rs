//! Storage container accessor boundary.
//!
//! The batch executor loads containers through this trait at batch start and
//! writes them back at commit. Durable storage engines implement it; the
//! in-memory store backs tests and embedding without one.

use super::associated_data::AssociatedDataContainer;
use super::attributes::AttributesContainer;
use super::body::EntityBodyContainer;
use super::prices::PricesContainer;
use super::references::ReferencesContainer;
use crate::types::{AssociatedDataKey, EntityType, Locale, PrimaryKey};
use std::collections::HashMap;

/// Load/persist boundary for entity containers.
pub trait ContainerStore {
    /// Loads the entity body.
    fn load_body(&self, entity_type: &EntityType, pk: PrimaryKey) -> Option<EntityBodyContainer>;

    /// Loads the attribute container for the given scope.
    fn load_attributes(
        &self,
        entity_type: &EntityType,
        pk: PrimaryKey,
        locale: Option<&Locale>,
    ) -> Option<AttributesContainer>;

    /// Loads the references container.
    fn load_references(&self, entity_type: &EntityType, pk: PrimaryKey)
        -> Option<ReferencesContainer>;

    /// Loads the prices container.
    fn load_prices(&self, entity_type: &EntityType, pk: PrimaryKey) -> Option<PricesContainer>;

    /// Loads one associated data container.
    fn load_associated_data(
        &self,
        entity_type: &EntityType,
        pk: PrimaryKey,
        key: &AssociatedDataKey,
    ) -> Option<AssociatedDataContainer>;

    /// Persists the entity body.
    fn put_body(&mut self, entity_type: &EntityType, body: EntityBodyContainer);

    /// Persists an attribute container.
    fn put_attributes(&mut self, entity_type: &EntityType, container: AttributesContainer);

    /// Persists the references container.
    fn put_references(&mut self, entity_type: &EntityType, container: ReferencesContainer);

    /// Persists the prices container.
    fn put_prices(&mut self, entity_type: &EntityType, container: PricesContainer);

    /// Persists one associated data container.
    fn put_associated_data(&mut self, entity_type: &EntityType, container: AssociatedDataContainer);

    /// Removes the entity body.
    fn remove_body(&mut self, entity_type: &EntityType, pk: PrimaryKey);

    /// Removes an attribute container.
    fn remove_attributes(&mut self, entity_type: &EntityType, pk: PrimaryKey, locale: Option<&Locale>);

    /// Removes the references container.
    fn remove_references(&mut self, entity_type: &EntityType, pk: PrimaryKey);

    /// Removes the prices container.
    fn remove_prices(&mut self, entity_type: &EntityType, pk: PrimaryKey);

    /// Removes one associated data container.
    fn remove_associated_data(
        &mut self,
        entity_type: &EntityType,
        pk: PrimaryKey,
        key: &AssociatedDataKey,
    );
}

/// Hash-map backed container store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    bodies: HashMap<(EntityType, PrimaryKey), EntityBodyContainer>,
    attributes: HashMap<(EntityType, PrimaryKey, Option<Locale>), AttributesContainer>,
    references: HashMap<(EntityType, PrimaryKey), ReferencesContainer>,
    prices: HashMap<(EntityType, PrimaryKey), PricesContainer>,
    associated_data: HashMap<(EntityType, PrimaryKey, AssociatedDataKey), AssociatedDataContainer>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the store holds no container at all for the entity.
    #[must_use]
    pub fn entity_is_absent(&self, entity_type: &EntityType, pk: PrimaryKey) -> bool {
        let bk = (entity_type.clone(), pk);
        self.bodies.get(&bk).is_none()
            && self.references.get(&bk).is_none()
            && self.prices.get(&bk).is_none()
            && !self.attributes.keys().any(|(t, p, _)| t == entity_type && *p == pk)
            && !self
                .associated_data
                .keys()
                .any(|(t, p, _)| t == entity_type && *p == pk)
    }
}

impl ContainerStore for InMemoryStore {
    fn load_body(&self, entity_type: &EntityType, pk: PrimaryKey) -> Option<EntityBodyContainer> {
        self.bodies.get(&(entity_type.clone(), pk)).cloned()
    }

    fn load_attributes(
        &self,
        entity_type: &EntityType,
        pk: PrimaryKey,
        locale: Option<&Locale>,
    ) -> Option<AttributesContainer> {
        self.attributes
            .get(&(entity_type.clone(), pk, locale.cloned()))
            .cloned()
    }

    fn load_references(
        &self,
        entity_type: &EntityType,
        pk: PrimaryKey,
    ) -> Option<ReferencesContainer> {
        self.references.get(&(entity_type.clone(), pk)).cloned()
    }

    fn load_prices(&self, entity_type: &EntityType, pk: PrimaryKey) -> Option<PricesContainer> {
        self.prices.get(&(entity_type.clone(), pk)).cloned()
    }

    fn load_associated_data(
        &self,
        entity_type: &EntityType,
        pk: PrimaryKey,
        key: &AssociatedDataKey,
    ) -> Option<AssociatedDataContainer> {
        self.associated_data
            .get(&(entity_type.clone(), pk, key.clone()))
            .cloned()
    }

    fn put_body(&mut self, entity_type: &EntityType, body: EntityBodyContainer) {
        self.bodies
            .insert((entity_type.clone(), body.primary_key), body);
    }

    fn put_attributes(&mut self, entity_type: &EntityType, container: AttributesContainer) {
        self.attributes.insert(
            (entity_type.clone(), container.entity_pk, container.locale.clone()),
            container,
        );
    }

    fn put_references(&mut self, entity_type: &EntityType, container: ReferencesContainer) {
        self.references
            .insert((entity_type.clone(), container.entity_pk), container);
    }

    fn put_prices(&mut self, entity_type: &EntityType, container: PricesContainer) {
        self.prices
            .insert((entity_type.clone(), container.entity_pk), container);
    }

    fn put_associated_data(&mut self, entity_type: &EntityType, container: AssociatedDataContainer) {
        self.associated_data.insert(
            (entity_type.clone(), container.entity_pk, container.key.clone()),
            container,
        );
    }

    fn remove_body(&mut self, entity_type: &EntityType, pk: PrimaryKey) {
        self.bodies.remove(&(entity_type.clone(), pk));
    }

    fn remove_attributes(
        &mut self,
        entity_type: &EntityType,
        pk: PrimaryKey,
        locale: Option<&Locale>,
    ) {
        self.attributes
            .remove(&(entity_type.clone(), pk, locale.cloned()));
    }

    fn remove_references(&mut self, entity_type: &EntityType, pk: PrimaryKey) {
        self.references.remove(&(entity_type.clone(), pk));
    }

    fn remove_prices(&mut self, entity_type: &EntityType, pk: PrimaryKey) {
        self.prices.remove(&(entity_type.clone(), pk));
    }

    fn remove_associated_data(
        &mut self,
        entity_type: &EntityType,
        pk: PrimaryKey,
        key: &AssociatedDataKey,
    ) {
        self.associated_data
            .remove(&(entity_type.clone(), pk, key.clone()));
    }
}
