//! End-to-end batch scenarios over the mutation executor.

use entidex_core::containers::InMemoryStore;
use entidex_core::index::{CatalogIndex, EntityIndex, IndexKey, IndexRegistry};
use entidex_core::mutation::{
    AttributeMutation, LocalMutation, ParentMutation, PriceMutation, ReferenceMutation,
};
use entidex_core::schema::{
    AttributeSchema, Cardinality, CompoundSchema, EntitySchema, ReferenceSchema, SchemaRegistry,
};
use entidex_core::types::{
    AttributeKey, Currency, EntityType, GroupReference, InnerRecordHandling, Locale, PriceKey,
    PrimaryKey, ReferenceKey,
};
use entidex_core::value::{AttributeType, CompoundTuple, Value};
use entidex_core::{BatchOptions, CoreError, CoreResult, MutationExecutor};

fn schemas() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register(
        EntitySchema::new(EntityType::new("Product"))
            .with_locale(Locale::new("en"))
            .with_locale(Locale::new("cs"))
            .with_attribute(
                AttributeSchema::new("code", AttributeType::Str)
                    .mandatory()
                    .unique(),
            )
            .with_attribute(
                AttributeSchema::new("visible", AttributeType::Bool)
                    .mandatory()
                    .with_default(Value::Bool(true))
                    .filterable(),
            )
            .with_attribute(
                AttributeSchema::new("name", AttributeType::Str)
                    .localized()
                    .filterable(),
            )
            .with_attribute(AttributeSchema::new("priority", AttributeType::Int).sortable())
            .with_compound(CompoundSchema::new(
                "name-priority",
                vec!["name".into(), "priority".into()],
            ))
            .with_reference(
                ReferenceSchema::new("brand", EntityType::new("Brand"))
                    .faceted()
                    .with_attribute(
                        AttributeSchema::new("market", AttributeType::Str).filterable(),
                    )
                    .with_attribute(
                        AttributeSchema::new("label", AttributeType::Str)
                            .localized()
                            .filterable(),
                    ),
            )
            .with_reference(
                ReferenceSchema::new("vendor", EntityType::new("Brand"))
                    .cardinality(Cardinality::ZeroOrOne)
                    .indexed(),
            )
            .with_reference(
                ReferenceSchema::new("category", EntityType::new("Category")).indexed(),
            ),
    );
    registry.register(EntitySchema::new(EntityType::new("Brand")));
    registry.register(EntitySchema::new(EntityType::new("Category")).with_hierarchy());
    registry
}

struct Fixture {
    store: InMemoryStore,
    schemas: SchemaRegistry,
    indexes: IndexRegistry,
    catalog: CatalogIndex,
    price_seq: u32,
}

impl Fixture {
    fn new() -> Self {
        Self {
            store: InMemoryStore::new(),
            schemas: schemas(),
            indexes: IndexRegistry::new(),
            catalog: CatalogIndex::new(),
            price_seq: 0,
        }
    }

    fn run(&mut self, entity: &str, pk: u32, mutations: &[LocalMutation]) -> CoreResult<()> {
        let mut exec = MutationExecutor::new(
            &mut self.store,
            &self.schemas,
            &mut self.indexes,
            &mut self.catalog,
            &EntityType::new(entity),
            PrimaryKey::new(pk),
            &mut self.price_seq,
            BatchOptions::default(),
        )?;
        match exec.apply_batch(mutations) {
            Ok(()) => exec.commit(),
            Err(error) => {
                exec.rollback().unwrap();
                Err(error)
            }
        }
    }

    fn remove(&mut self, entity: &str, pk: u32) -> CoreResult<()> {
        let mut exec = MutationExecutor::new(
            &mut self.store,
            &self.schemas,
            &mut self.indexes,
            &mut self.catalog,
            &EntityType::new(entity),
            PrimaryKey::new(pk),
            &mut self.price_seq,
            BatchOptions::default(),
        )?;
        exec.remove_entity()?;
        exec.commit()
    }

    fn global(&self) -> &EntityIndex {
        self.indexes.get(&IndexKey::Global).unwrap()
    }
}

fn upsert(name: &str, value: Value) -> LocalMutation {
    LocalMutation::Attribute(AttributeMutation::Upsert {
        key: AttributeKey::global(name),
        value,
    })
}

fn upsert_localized(name: &str, locale: &str, value: Value) -> LocalMutation {
    LocalMutation::Attribute(AttributeMutation::Upsert {
        key: AttributeKey::localized(name, Locale::new(locale)),
        value,
    })
}

fn remove_localized(name: &str, locale: &str) -> LocalMutation {
    LocalMutation::Attribute(AttributeMutation::Remove {
        key: AttributeKey::localized(name, Locale::new(locale)),
    })
}

fn insert_reference(name: &str, pk: u32, group: Option<u32>) -> LocalMutation {
    LocalMutation::Reference(ReferenceMutation::Insert {
        key: ReferenceKey::new(name, PrimaryKey::new(pk)),
        group: group.map(|g| GroupReference::new(EntityType::new("BrandGroup"), PrimaryKey::new(g))),
    })
}

fn price_key() -> PriceKey {
    PriceKey::new(1, "basic", Currency::new("EUR"))
}

fn price_upsert(without_tax: i64, with_tax: i64, sellable: bool) -> LocalMutation {
    LocalMutation::Price(PriceMutation::Upsert {
        key: price_key(),
        inner_record_id: None,
        validity: None,
        without_tax,
        with_tax,
        sellable,
    })
}

#[test]
fn first_batch_seeds_the_global_index() {
    let mut f = Fixture::new();
    f.run("Product", 1, &[upsert("code", Value::Str("p-1".into()))])
        .unwrap();

    let global = f.global();
    assert!(global.contains_primary_key(PrimaryKey::new(1)));
    assert_eq!(
        global.unique_owner(&AttributeKey::global("code"), &Value::Str("p-1".into())),
        Some(PrimaryKey::new(1))
    );
    // unique attributes answer equality filters as well
    assert!(f
        .global()
        .filtered(&AttributeKey::global("code"), &Value::Str("p-1".into()))
        .is_some_and(|pks| pks.contains(&PrimaryKey::new(1))));
}

#[test]
fn mandatory_default_is_applied_implicitly() {
    let mut f = Fixture::new();
    f.run("Product", 1, &[upsert("code", Value::Str("p-1".into()))])
        .unwrap();
    assert!(f
        .global()
        .filtered(&AttributeKey::global("visible"), &Value::Bool(true))
        .is_some_and(|pks| pks.contains(&PrimaryKey::new(1))));
}

#[test]
fn mandatory_without_default_fails_the_batch() {
    let mut f = Fixture::new();
    let err = f.run("Product", 1, &[upsert("priority", Value::Int(3))]).unwrap_err();
    match err {
        CoreError::MandatoryDataMissing { violations } => {
            assert!(violations.contains(&"code".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unique_collision_rolls_the_batch_back() {
    let mut f = Fixture::new();
    f.run("Product", 1, &[upsert("code", Value::Str("x".into()))])
        .unwrap();
    let snapshot = f.indexes.clone();

    let err = f
        .run("Product", 2, &[upsert("code", Value::Str("x".into()))])
        .unwrap_err();
    assert!(matches!(err, CoreError::UniqueConstraintViolated { .. }));
    assert_eq!(f.indexes, snapshot);
    assert!(!f.global().contains_primary_key(PrimaryKey::new(2)));
}

#[test]
fn language_and_localized_compound_enter_at_commit() {
    let mut f = Fixture::new();
    let en = Locale::new("en");
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            upsert_localized("name", "en", Value::Str("Hammer".into())),
        ],
    )
    .unwrap();

    let global = f.global();
    assert!(global.has_language(&en, PrimaryKey::new(1)));
    let compound = AttributeKey::localized("name-priority", en.clone());
    assert_eq!(
        global.compound_of(&compound, PrimaryKey::new(1)),
        Some(&CompoundTuple(vec![
            Some(Value::Str("Hammer".into())),
            None
        ]))
    );
}

#[test]
fn compound_tuple_follows_element_updates() {
    let mut f = Fixture::new();
    let en = Locale::new("en");
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            upsert_localized("name", "en", Value::Str("Hammer".into())),
        ],
    )
    .unwrap();
    f.run("Product", 1, &[upsert("priority", Value::Int(5))])
        .unwrap();

    let global = f.global();
    assert_eq!(
        global.sort_key_of(&AttributeKey::global("priority"), PrimaryKey::new(1)),
        Some(&Value::Int(5))
    );
    let compound = AttributeKey::localized("name-priority", en);
    assert_eq!(
        global.compound_of(&compound, PrimaryKey::new(1)),
        Some(&CompoundTuple(vec![
            Some(Value::Str("Hammer".into())),
            Some(Value::Int(5))
        ]))
    );
}

#[test]
fn language_removal_retracts_localized_structures() {
    let mut f = Fixture::new();
    let en = Locale::new("en");
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            upsert_localized("name", "en", Value::Str("Hammer".into())),
        ],
    )
    .unwrap();
    f.run("Product", 1, &[remove_localized("name", "en")]).unwrap();

    let global = f.global();
    assert!(!global.has_language(&en, PrimaryKey::new(1)));
    assert!(global
        .compound_of(
            &AttributeKey::localized("name-priority", en.clone()),
            PrimaryKey::new(1)
        )
        .is_none());
    assert!(global
        .filtered(
            &AttributeKey::localized("name", en),
            &Value::Str("Hammer".into())
        )
        .is_none());
}

#[test]
fn reference_insert_builds_reduced_indexes() {
    let mut f = Fixture::new();
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            upsert("priority", Value::Int(5)),
            insert_reference("brand", 10, Some(100)),
            LocalMutation::Reference(ReferenceMutation::Attribute {
                key: ReferenceKey::new("brand", PrimaryKey::new(10)),
                mutation: AttributeMutation::Upsert {
                    key: AttributeKey::global("market"),
                    value: Value::Str("eu".into()),
                },
            }),
        ],
    )
    .unwrap();

    // per-type index: filter entries carry the referenced primary key
    let type_key = IndexKey::ReferencedEntityType {
        reference_name: "brand".into(),
    };
    let type_index = f.indexes.get(&type_key).unwrap();
    assert!(type_index.contains_primary_key_counted(PrimaryKey::new(10)));
    assert!(type_index
        .filtered(&AttributeKey::global("market"), &Value::Str("eu".into()))
        .is_some_and(|pks| pks.contains(&PrimaryKey::new(10))));

    // per-instance index: backfilled with the owner's data
    let brand = ReferenceKey::new("brand", PrimaryKey::new(10));
    let instance_key = IndexKey::ReferencedEntity {
        reference: brand.clone(),
    };
    let instance = f.indexes.get(&instance_key).unwrap();
    assert!(instance.contains_primary_key(PrimaryKey::new(1)));
    assert_eq!(
        instance.unique_owner(&AttributeKey::global("code"), &Value::Str("p-1".into())),
        Some(PrimaryKey::new(1))
    );
    assert_eq!(
        instance.sort_key_of(&AttributeKey::global("priority"), PrimaryKey::new(1)),
        Some(&Value::Int(5))
    );
    assert!(instance
        .filtered(&AttributeKey::global("market"), &Value::Str("eu".into()))
        .is_some_and(|pks| pks.contains(&PrimaryKey::new(1))));

    // facet occurrence in the global and the instance index, under its group
    let group = Some(PrimaryKey::new(100));
    assert!(f
        .global()
        .facets()
        .owners(&brand, group)
        .is_some_and(|owners| owners.contains(&PrimaryKey::new(1))));
    assert!(instance
        .facets()
        .owners(&brand, group)
        .is_some_and(|owners| owners.contains(&PrimaryKey::new(1))));
}

#[test]
fn hierarchical_referenced_type_gets_a_hierarchy_node_index() {
    let mut f = Fixture::new();
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            insert_reference("category", 4, None),
        ],
    )
    .unwrap();
    let key = IndexKey::ReferencedHierarchyNode {
        reference: ReferenceKey::new("category", PrimaryKey::new(4)),
    };
    assert!(f.indexes.contains(&key));
}

#[test]
fn reference_removal_drops_emptied_reduced_indexes() {
    let mut f = Fixture::new();
    let brand = ReferenceKey::new("brand", PrimaryKey::new(10));
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            insert_reference("brand", 10, Some(100)),
        ],
    )
    .unwrap();
    f.run(
        "Product",
        1,
        &[LocalMutation::Reference(ReferenceMutation::Remove {
            key: brand.clone(),
        })],
    )
    .unwrap();

    assert!(!f.indexes.contains(&IndexKey::ReferencedEntityType {
        reference_name: "brand".into()
    }));
    assert!(!f.indexes.contains(&IndexKey::ReferencedEntity {
        reference: brand.clone()
    }));
    assert!(f
        .global()
        .facets()
        .owners(&brand, Some(PrimaryKey::new(100)))
        .is_none());
}

#[test]
fn reference_removal_retracts_its_locale_from_surviving_indexes() {
    let mut f = Fixture::new();
    let cs = Locale::new("cs");
    let brand = ReferenceKey::new("brand", PrimaryKey::new(10));
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            insert_reference("brand", 10, None),
            LocalMutation::Reference(ReferenceMutation::Attribute {
                key: brand.clone(),
                mutation: AttributeMutation::Upsert {
                    key: AttributeKey::localized("label", cs.clone()),
                    value: Value::Str("kladivo".into()),
                },
            }),
            insert_reference("vendor", 20, None),
        ],
    )
    .unwrap();
    assert!(f.global().has_language(&cs, PrimaryKey::new(1)));

    // the reference attribute was the locale's only use
    f.run(
        "Product",
        1,
        &[LocalMutation::Reference(ReferenceMutation::Remove { key: brand })],
    )
    .unwrap();

    assert!(!f.global().has_language(&cs, PrimaryKey::new(1)));
    let vendor = f
        .indexes
        .get(&IndexKey::ReferencedEntity {
            reference: ReferenceKey::new("vendor", PrimaryKey::new(20)),
        })
        .unwrap();
    assert!(!vendor.has_language(&cs, PrimaryKey::new(1)));
}

#[test]
fn reinsert_of_live_reference_replaces_its_state() {
    let mut f = Fixture::new();
    let brand = ReferenceKey::new("brand", PrimaryKey::new(10));
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            insert_reference("brand", 10, Some(100)),
        ],
    )
    .unwrap();
    f.run("Product", 1, &[insert_reference("brand", 10, Some(200))])
        .unwrap();

    let facets = f.global().facets();
    assert!(facets.owners(&brand, Some(PrimaryKey::new(100))).is_none());
    assert!(facets
        .owners(&brand, Some(PrimaryKey::new(200)))
        .is_some_and(|owners| owners.contains(&PrimaryKey::new(1))));
}

#[test]
fn group_switch_moves_the_facet_occurrence() {
    let mut f = Fixture::new();
    let brand = ReferenceKey::new("brand", PrimaryKey::new(10));
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            insert_reference("brand", 10, None),
        ],
    )
    .unwrap();
    f.run(
        "Product",
        1,
        &[LocalMutation::Reference(ReferenceMutation::SetGroup {
            key: brand.clone(),
            group: GroupReference::new(EntityType::new("BrandGroup"), PrimaryKey::new(7)),
        })],
    )
    .unwrap();

    let facets = f.global().facets();
    assert!(facets.owners(&brand, None).is_none());
    assert!(facets
        .owners(&brand, Some(PrimaryKey::new(7)))
        .is_some_and(|owners| owners.contains(&PrimaryKey::new(1))));
}

#[test]
fn cardinality_violation_rolls_everything_back() {
    let mut f = Fixture::new();
    let err = f
        .run(
            "Product",
            1,
            &[
                upsert("code", Value::Str("p-1".into())),
                insert_reference("vendor", 20, None),
                insert_reference("vendor", 21, None),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::CardinalityViolated { .. }));
    assert!(f.indexes.is_empty());
    assert!(f.catalog.is_empty());
}

#[test]
fn sellable_price_keeps_its_internal_id_across_updates() {
    let mut f = Fixture::new();
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            price_upsert(100, 121, true),
        ],
    )
    .unwrap();
    let first = f.global().prices().get(1).unwrap().clone();
    assert_eq!(first.with_tax, 121);

    f.run("Product", 1, &[price_upsert(200, 242, true)]).unwrap();
    let updated = f.global().prices().get(1).unwrap();
    assert_eq!(updated.internal_id, first.internal_id);
    assert_eq!(updated.with_tax, 242);
}

#[test]
fn non_sellable_update_leaves_the_price_index() {
    let mut f = Fixture::new();
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            price_upsert(100, 121, true),
        ],
    )
    .unwrap();
    f.run("Product", 1, &[price_upsert(100, 121, false)]).unwrap();
    assert!(f.global().prices().is_empty());
}

#[test]
fn price_removal_requires_an_existing_price() {
    let mut f = Fixture::new();
    f.run("Product", 1, &[upsert("code", Value::Str("p-1".into()))])
        .unwrap();
    let err = f
        .run(
            "Product",
            1,
            &[LocalMutation::Price(PriceMutation::Remove { key: price_key() })],
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::PriceNotFound { .. }));
}

#[test]
fn handling_switch_reindexes_prices_everywhere() {
    let mut f = Fixture::new();
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            insert_reference("brand", 10, None),
            price_upsert(100, 121, true),
        ],
    )
    .unwrap();
    f.run(
        "Product",
        1,
        &[LocalMutation::InnerRecordHandling {
            handling: InnerRecordHandling::Sum,
        }],
    )
    .unwrap();

    assert!(f.global().prices().get(1).is_some());
    let instance = f
        .indexes
        .get(&IndexKey::ReferencedEntity {
            reference: ReferenceKey::new("brand", PrimaryKey::new(10)),
        })
        .unwrap();
    assert!(instance.prices().get(1).is_some());
}

#[test]
fn parent_mutations_manage_hierarchy_placement() {
    let mut f = Fixture::new();
    f.run(
        "Category",
        2,
        &[LocalMutation::Parent(ParentMutation::Set {
            parent: PrimaryKey::new(1),
        })],
    )
    .unwrap();
    assert!(f
        .global()
        .hierarchy()
        .children_of(PrimaryKey::new(1))
        .is_some_and(|c| c.contains(&PrimaryKey::new(2))));

    // removing the parent re-places the node as a root
    f.run("Category", 2, &[LocalMutation::Parent(ParentMutation::Remove)])
        .unwrap();
    assert!(f.global().hierarchy().roots().contains(&PrimaryKey::new(2)));
}

#[test]
fn parent_mutation_on_flat_entity_type_is_rejected() {
    let mut f = Fixture::new();
    let err = f
        .run(
            "Product",
            1,
            &[LocalMutation::Parent(ParentMutation::Set {
                parent: PrimaryKey::new(9),
            })],
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::HierarchyNotSupported { .. }));
}

#[test]
fn entity_removal_tears_down_every_index() {
    let mut f = Fixture::new();
    f.run(
        "Product",
        1,
        &[
            upsert("code", Value::Str("p-1".into())),
            upsert_localized("name", "en", Value::Str("Hammer".into())),
            insert_reference("brand", 10, Some(100)),
            LocalMutation::Reference(ReferenceMutation::Attribute {
                key: ReferenceKey::new("brand", PrimaryKey::new(10)),
                mutation: AttributeMutation::Upsert {
                    key: AttributeKey::global("market"),
                    value: Value::Str("eu".into()),
                },
            }),
            price_upsert(100, 121, true),
        ],
    )
    .unwrap();

    f.remove("Product", 1).unwrap();

    assert!(f.global().is_empty());
    assert!(!f.indexes.contains(&IndexKey::ReferencedEntityType {
        reference_name: "brand".into()
    }));
    assert!(!f.indexes.contains(&IndexKey::ReferencedEntity {
        reference: ReferenceKey::new("brand", PrimaryKey::new(10)),
    }));
    assert!(f.catalog.is_empty());

    // primary key can be reused afresh
    f.run("Product", 1, &[upsert("code", Value::Str("p-1".into()))])
        .unwrap();
    assert!(f.global().contains_primary_key(PrimaryKey::new(1)));
}

#[test]
fn removing_a_missing_entity_is_an_error() {
    let mut f = Fixture::new();
    assert!(f.remove("Product", 42).is_err());
}
