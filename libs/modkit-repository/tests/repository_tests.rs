#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use common::{RecordingOperations, row, sample_mapping, text};
use modkit_repository::{
    AggregateEvent, AggregateEventKind, ComponentHub, EntityCallback, EntityCallbacks,
    EntityRecord, MappingContext, NotificationPublisher, PersistentEntity,
    QueryMappingConfiguration, RepositoryError, RepositoryFactory, Row, RowMapper, SqlOperations,
    SqlValue, StackAssembler, StackOverrides, ValueType,
};
use parking_lot::Mutex;

#[derive(Default)]
struct Events(Mutex<Vec<AggregateEvent>>);

impl Events {
    fn kinds(&self) -> Vec<AggregateEventKind> {
        self.0.lock().iter().map(|e| e.kind).collect()
    }
}

impl NotificationPublisher for Events {
    fn publish(&self, event: AggregateEvent) {
        self.0.lock().push(event);
    }
}

/// Fills in a default customer and marks loaded records.
struct Defaults;

impl EntityCallback for Defaults {
    fn before_save(&self, _entity: &PersistentEntity, row: &mut Row) -> modkit_repository::Result<()> {
        row.entry("customer".to_owned()).or_insert_with(|| text("walk-in"));
        Ok(())
    }

    fn after_load(
        &self,
        entity: &PersistentEntity,
        record: &mut EntityRecord,
    ) -> modkit_repository::Result<()> {
        record
            .values
            .insert("loaded_as".to_owned(), text(entity.name()));
        Ok(())
    }
}

struct UpperCustomer;

impl RowMapper for UpperCustomer {
    fn map_row(&self, mut record: EntityRecord) -> modkit_repository::Result<EntityRecord> {
        if let Some(SqlValue::Text(customer)) = record.values.get_mut("customer") {
            *customer = customer.to_uppercase();
        }
        Ok(record)
    }
}

fn factory(ops: &Arc<RecordingOperations>, events: &Arc<Events>) -> RepositoryFactory {
    let operations: Arc<dyn SqlOperations> = ops.clone();
    let publisher: Arc<dyn NotificationPublisher> = events.clone();
    let stack = StackAssembler::new()
        .assemble(
            StackOverrides::new()
                .with_mapping_context(sample_mapping())
                .with_operations(operations)
                .with_publisher(publisher),
        )
        .unwrap();
    RepositoryFactory::new(stack).unwrap()
}

#[test]
fn save_inserts_new_aggregate_and_converts_for_storage() {
    let ops = RecordingOperations::sqlite();
    let events = Arc::new(Events::default());
    let orders = factory(&ops, &events).repository("order").unwrap();

    let id = orders
        .save(row(&[
            ("customer", text("acme")),
            ("paid", SqlValue::Bool(true)),
        ]))
        .unwrap();

    assert_eq!(id, SqlValue::Integer(100));
    let stored = ops.rows("orders");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["paid"], SqlValue::Integer(1));
    assert_eq!(
        ops.statements(),
        vec![
            r#"INSERT INTO "orders" ("customer", "paid", "tags") VALUES (:customer, :paid, :tags)"#
                .to_owned()
        ]
    );
    assert_eq!(
        events.kinds(),
        vec![AggregateEventKind::BeforeSave, AggregateEventKind::AfterSave]
    );
}

#[test]
fn find_by_id_reads_values_and_relations() {
    let ops = RecordingOperations::sqlite();
    ops.seed(
        "orders",
        row(&[
            ("id", SqlValue::Integer(1)),
            ("customer", text("acme")),
            ("paid", SqlValue::Integer(0)),
        ]),
    );
    ops.seed(
        "order_lines",
        row(&[
            ("id", SqlValue::Integer(10)),
            ("order_id", SqlValue::Integer(1)),
            ("sku", text("A-1")),
        ]),
    );
    ops.seed(
        "order_lines",
        row(&[
            ("id", SqlValue::Integer(11)),
            ("order_id", SqlValue::Integer(2)),
            ("sku", text("B-1")),
        ]),
    );
    let events = Arc::new(Events::default());
    let orders = factory(&ops, &events).repository("order").unwrap();

    let order = orders.find_by_id(&SqlValue::Integer(1)).unwrap().unwrap();

    assert_eq!(order.get("paid"), Some(&SqlValue::Bool(false)));
    let lines = &order.relations["lines"];
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["sku"], text("A-1"));
    assert_eq!(events.kinds(), vec![AggregateEventKind::AfterLoad]);

    assert!(orders.find_by_id(&SqlValue::Integer(9)).unwrap().is_none());
}

#[test]
fn save_with_id_updates_existing_row() {
    let ops = RecordingOperations::sqlite();
    ops.seed(
        "orders",
        row(&[("id", SqlValue::Integer(1)), ("customer", text("acme"))]),
    );
    let events = Arc::new(Events::default());
    let orders = factory(&ops, &events).repository("order").unwrap();

    let id = orders
        .save(row(&[("id", SqlValue::Integer(1)), ("customer", text("globex"))]))
        .unwrap();

    assert_eq!(id, SqlValue::Integer(1));
    assert_eq!(ops.rows("orders")[0]["customer"], text("globex"));
}

#[test]
fn update_of_missing_row_fails() {
    let ops = RecordingOperations::sqlite();
    let events = Arc::new(Events::default());
    let orders = factory(&ops, &events).repository("order").unwrap();

    let err = orders
        .save(row(&[("id", SqlValue::Integer(42)), ("customer", text("ghost"))]))
        .unwrap_err();

    assert!(matches!(err, RepositoryError::IncorrectUpdate { ref entity } if entity == "order"));
}

#[test]
fn count_exists_and_delete() {
    let ops = RecordingOperations::sqlite();
    ops.seed("orders", row(&[("id", SqlValue::Integer(1))]));
    ops.seed("orders", row(&[("id", SqlValue::Integer(2))]));
    let events = Arc::new(Events::default());
    let orders = factory(&ops, &events).repository("order").unwrap();

    assert_eq!(orders.count().unwrap(), 2);
    assert!(orders.exists_by_id(&SqlValue::Integer(2)).unwrap());

    assert!(orders.delete_by_id(&SqlValue::Integer(2)).unwrap());
    assert!(!orders.delete_by_id(&SqlValue::Integer(2)).unwrap());
    assert!(!orders.exists_by_id(&SqlValue::Integer(2)).unwrap());
    assert_eq!(orders.count().unwrap(), 1);
    assert_eq!(orders.find_all().unwrap().len(), 1);
}

#[test]
fn unknown_entity_has_no_repository() {
    let ops = RecordingOperations::sqlite();
    let events = Arc::new(Events::default());
    let err = factory(&ops, &events).repository("invoice").unwrap_err();
    assert!(matches!(err, RepositoryError::UnknownEntity(ref name) if name == "invoice"));
}

#[test]
fn callbacks_from_lookup_and_row_mappers_apply() {
    let ops = RecordingOperations::sqlite();
    let operations: Arc<dyn SqlOperations> = ops.clone();
    let hub = Arc::new(ComponentHub::new());
    hub.register::<EntityCallbacks>(Arc::new(EntityCallbacks::new().with(Arc::new(Defaults))));

    let stack = StackAssembler::new()
        .with_lookup(hub)
        .assemble(
            StackOverrides::new()
                .with_mapping_context(sample_mapping())
                .with_operations(operations)
                .with_query_mapping_configuration(
                    QueryMappingConfiguration::empty().with_mapper("order", Arc::new(UpperCustomer)),
                ),
        )
        .unwrap();
    let orders = RepositoryFactory::new(stack)
        .unwrap()
        .repository("order")
        .unwrap();

    let id = orders.save(Row::new()).unwrap();
    let order = orders.find_by_id(&id).unwrap().unwrap();

    assert_eq!(order.get("customer"), Some(&text("WALK-IN")));
    assert_eq!(order.get("loaded_as"), Some(&text("order")));
}

#[test]
fn factory_settings_apply_to_repositories_created_afterwards() {
    let ops = RecordingOperations::sqlite();
    ops.seed(
        "orders",
        row(&[("id", SqlValue::Integer(1)), ("customer", text("acme"))]),
    );
    let events = Arc::new(Events::default());
    let mut factory = factory(&ops, &events);

    let before = factory.repository("order").unwrap();

    factory.set_query_mapping_configuration(
        QueryMappingConfiguration::empty().with_mapper("order", Arc::new(UpperCustomer)),
    );
    factory.set_entity_callbacks(EntityCallbacks::new().with(Arc::new(Defaults)));
    let after = factory.repository("order").unwrap();

    let plain = before.find_by_id(&SqlValue::Integer(1)).unwrap().unwrap();
    assert_eq!(plain.get("customer"), Some(&text("acme")));
    assert_eq!(plain.get("loaded_as"), None);

    let mapped = after.find_by_id(&SqlValue::Integer(1)).unwrap().unwrap();
    assert_eq!(mapped.get("customer"), Some(&text("ACME")));
    assert_eq!(mapped.get("loaded_as"), Some(&text("order")));
}

#[test]
fn json_columns_round_trip_on_every_builtin_dialect() {
    let body = serde_json::json!({"a": 1, "tags": ["x"]});

    for (product, stored) in [
        ("SQLite", SqlValue::Text(body.to_string())),
        ("MySQL", SqlValue::Text(body.to_string())),
        ("PostgreSQL", SqlValue::Json(body.clone())),
    ] {
        let ops = RecordingOperations::new(product);
        let operations: Arc<dyn SqlOperations> = ops.clone();
        let mapping = Arc::new(MappingContext::new().with_entity(
            PersistentEntity::new("doc", "docs", "id", ValueType::Integer)
                .column("body", ValueType::Json),
        ));
        let stack = StackAssembler::new()
            .assemble(
                StackOverrides::new()
                    .with_mapping_context(mapping)
                    .with_operations(operations),
            )
            .unwrap();
        let docs = RepositoryFactory::new(stack)
            .unwrap()
            .repository("doc")
            .unwrap();

        let id = docs
            .save(row(&[("body", SqlValue::Json(body.clone()))]))
            .unwrap();

        assert_eq!(ops.rows("docs")[0]["body"], stored, "{product}");
        let loaded = docs.find_by_id(&id).unwrap().unwrap();
        assert_eq!(loaded.get("body"), Some(&SqlValue::Json(body.clone())), "{product}");
    }
}
