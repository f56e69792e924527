//! Property test: rolling back a batch restores the exact pre-batch index
//! state, whatever the batch did and wherever it stopped.

use entidex_core::containers::InMemoryStore;
use entidex_core::index::{CatalogIndex, IndexRegistry};
use entidex_core::mutation::{AttributeMutation, LocalMutation, PriceMutation, ReferenceMutation};
use entidex_core::schema::{
    AttributeSchema, CompoundSchema, EntitySchema, ReferenceSchema, SchemaRegistry,
};
use entidex_core::types::{
    AttributeKey, Currency, EntityType, Locale, PriceKey, PrimaryKey, ReferenceKey,
};
use entidex_core::value::{AttributeType, Value};
use entidex_core::{BatchOptions, MutationExecutor};
use proptest::prelude::*;

fn schemas() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register(
        EntitySchema::new(EntityType::new("Product"))
            .with_locale(Locale::new("en"))
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
            .with_reference(ReferenceSchema::new("brand", EntityType::new("Brand")).faceted()),
    );
    registry.register(EntitySchema::new(EntityType::new("Brand")));
    registry
}

#[derive(Debug, Clone)]
enum Op {
    Priority(i64),
    NameEn(String),
    RemoveNameEn,
    Code(String),
    InsertBrand(u32),
    RemoveBrand(u32),
    Price(i64, bool),
}

impl Op {
    fn to_mutation(&self) -> LocalMutation {
        match self {
            Self::Priority(value) => LocalMutation::Attribute(AttributeMutation::Upsert {
                key: AttributeKey::global("priority"),
                value: Value::Int(*value),
            }),
            Self::NameEn(value) => LocalMutation::Attribute(AttributeMutation::Upsert {
                key: AttributeKey::localized("name", Locale::new("en")),
                value: Value::Str(value.clone()),
            }),
            Self::RemoveNameEn => LocalMutation::Attribute(AttributeMutation::Remove {
                key: AttributeKey::localized("name", Locale::new("en")),
            }),
            Self::Code(value) => LocalMutation::Attribute(AttributeMutation::Upsert {
                key: AttributeKey::global("code"),
                value: Value::Str(value.clone()),
            }),
            Self::InsertBrand(pk) => LocalMutation::Reference(ReferenceMutation::Insert {
                key: ReferenceKey::new("brand", PrimaryKey::new(*pk)),
                group: None,
            }),
            Self::RemoveBrand(pk) => LocalMutation::Reference(ReferenceMutation::Remove {
                key: ReferenceKey::new("brand", PrimaryKey::new(*pk)),
            }),
            Self::Price(amount, sellable) => LocalMutation::Price(PriceMutation::Upsert {
                key: PriceKey::new(1, "basic", Currency::new("EUR")),
                inner_record_id: None,
                validity: None,
                without_tax: *amount,
                with_tax: *amount + *amount / 5,
                sellable: *sellable,
            }),
        }
    }
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-5i64..5).prop_map(Op::Priority),
        "[a-c]{1,2}".prop_map(Op::NameEn),
        Just(Op::RemoveNameEn),
        "[a-d]".prop_map(Op::Code),
        (10u32..13).prop_map(Op::InsertBrand),
        (10u32..13).prop_map(Op::RemoveBrand),
        ((50i64..60), any::<bool>()).prop_map(|(amount, sellable)| Op::Price(amount, sellable)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn rollback_restores_pre_batch_indexes(ops in proptest::collection::vec(op(), 1..12)) {
        let mut store = InMemoryStore::new();
        let schemas = schemas();
        let mut indexes = IndexRegistry::new();
        let mut catalog = CatalogIndex::new();
        let mut price_seq = 0u32;
        let product = EntityType::new("Product");

        // committed base entity the batch mutates
        {
            let mut exec = MutationExecutor::new(
                &mut store,
                &schemas,
                &mut indexes,
                &mut catalog,
                &product,
                PrimaryKey::new(1),
                &mut price_seq,
                BatchOptions::default(),
            ).unwrap();
            exec.apply_batch(&[
                Op::Code("base".into()).to_mutation(),
                Op::NameEn("Base".into()).to_mutation(),
                Op::InsertBrand(10).to_mutation(),
            ]).unwrap();
            exec.commit().unwrap();
        }
        let snapshot_indexes = indexes.clone();
        let snapshot_catalog = catalog.clone();

        {
            let mut exec = MutationExecutor::new(
                &mut store,
                &schemas,
                &mut indexes,
                &mut catalog,
                &product,
                PrimaryKey::new(1),
                &mut price_seq,
                BatchOptions::default(),
            ).unwrap();
            for op in &ops {
                // a failing op ends the batch; rollback must cope either way
                if exec.apply_mutation(&op.to_mutation()).is_err() {
                    break;
                }
            }
            exec.rollback().unwrap();
        }

        prop_assert_eq!(&indexes, &snapshot_indexes);
        prop_assert_eq!(&catalog, &snapshot_catalog);
    }
}
