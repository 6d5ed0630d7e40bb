#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use modkit_repository::{
    AssemblyHook, MappingContext, PersistentEntity, ResolutionSource, Role, Row, SqlOperations,
    SqlParameters, SqlValue, ValueType,
};
use parking_lot::Mutex;

/// In-memory operations handle.
///
/// Keeps rows per table, records every statement and counts metadata probes.
/// Statements are only inspected for their verb and table name; `WHERE`
/// clauses are emulated by matching every bound parameter against the row.
pub struct RecordingOperations {
    product: String,
    probes: AtomicUsize,
    statements: Mutex<Vec<String>>,
    tables: Mutex<BTreeMap<String, Vec<Row>>>,
    next_id: AtomicI64,
}

impl RecordingOperations {
    pub fn new(product: &str) -> Arc<Self> {
        Arc::new(Self {
            product: product.to_owned(),
            probes: AtomicUsize::new(0),
            statements: Mutex::new(Vec::new()),
            tables: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(100),
        })
    }

    pub fn sqlite() -> Arc<Self> {
        Self::new("SQLite")
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    pub fn seed(&self, table: &str, row: Row) {
        self.tables
            .lock()
            .entry(table.to_owned())
            .or_default()
            .push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    fn record(&self, sql: &str) {
        self.statements.lock().push(sql.to_owned());
    }

    fn insert_row(&self, sql: &str, params: &SqlParameters) -> SqlValue {
        let mut row = to_row(params);
        let id = match row.get("id") {
            Some(id) if !id.is_null() => id.clone(),
            _ => {
                let id = SqlValue::Integer(self.next_id.fetch_add(1, Ordering::SeqCst));
                row.insert("id".to_owned(), id.clone());
                id
            }
        };
        self.seed(&table_of(sql), row);
        id
    }
}

impl SqlOperations for RecordingOperations {
    fn product_name(&self) -> anyhow::Result<String> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.product.clone())
    }

    fn query(&self, sql: &str, params: &SqlParameters) -> anyhow::Result<Vec<Row>> {
        self.record(sql);
        let matching: Vec<Row> = self
            .rows(&table_of(sql))
            .into_iter()
            .filter(|row| row_matches(row, params))
            .collect();

        if sql.contains("COUNT(*)") {
            let mut count = Row::new();
            count.insert("count".to_owned(), SqlValue::Integer(i64::try_from(matching.len()).unwrap()));
            return Ok(vec![count]);
        }
        Ok(matching)
    }

    fn update(&self, sql: &str, params: &SqlParameters) -> anyhow::Result<u64> {
        self.record(sql);
        let table = table_of(sql);

        if sql.starts_with("INSERT") {
            self.insert_row(sql, params);
            return Ok(1);
        }

        let mut tables = self.tables.lock();
        let rows = tables.entry(table).or_default();
        if sql.starts_with("UPDATE") {
            let id = params.get("id").cloned();
            let mut affected = 0;
            for row in rows.iter_mut().filter(|row| row.get("id").cloned() == id) {
                *row = to_row(params);
                affected += 1;
            }
            return Ok(affected);
        }

        let before = rows.len();
        rows.retain(|row| !row_matches(row, params));
        Ok(u64::try_from(before - rows.len()).unwrap())
    }

    fn insert_returning_key(
        &self,
        sql: &str,
        params: &SqlParameters,
        _key_columns: &[String],
    ) -> anyhow::Result<Option<SqlValue>> {
        self.record(sql);
        Ok(Some(self.insert_row(sql, params)))
    }
}

fn to_row(params: &SqlParameters) -> Row {
    params
        .iter()
        .map(|(name, value)| (name.to_owned(), value.clone()))
        .collect()
}

fn row_matches(row: &Row, params: &SqlParameters) -> bool {
    params.iter().all(|(name, value)| row.get(name) == Some(value))
}

fn table_of(sql: &str) -> String {
    let mut words = sql.split_whitespace();
    while let Some(word) = words.next() {
        if matches!(word, "FROM" | "INTO" | "UPDATE")
            && let Some(table) = words.next()
        {
            return table.trim_matches(|c| c == '"' || c == '`').to_owned();
        }
    }
    String::new()
}

/// Records every role resolution reported by the assembler.
#[derive(Default)]
pub struct CountingHook {
    events: Mutex<Vec<(Role, ResolutionSource)>>,
}

impl CountingHook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(Role, ResolutionSource)> {
        self.events.lock().clone()
    }

    pub fn source_of(&self, role: Role) -> Option<ResolutionSource> {
        self.events
            .lock()
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, source)| *source)
    }

    pub fn defaults_built(&self) -> Vec<Role> {
        self.events
            .lock()
            .iter()
            .filter(|(_, source)| *source == ResolutionSource::Default)
            .map(|(role, _)| *role)
            .collect()
    }
}

impl AssemblyHook for CountingHook {
    fn on_resolved(&self, role: Role, source: ResolutionSource) {
        self.events.lock().push((role, source));
    }
}

/// `order` aggregate with `line` children.
pub fn sample_mapping() -> Arc<MappingContext> {
    Arc::new(
        MappingContext::new()
            .with_entity(
                PersistentEntity::new("order", "orders", "id", ValueType::Integer)
                    .column("customer", ValueType::Text)
                    .column("paid", ValueType::Bool)
                    .array("tags", ValueType::Text)
                    .relation("lines", "line", "order_id"),
            )
            .with_entity(
                PersistentEntity::new("line", "order_lines", "id", ValueType::Integer)
                    .column("order_id", ValueType::Integer)
                    .column("sku", ValueType::Text),
            ),
    )
}

pub fn row(values: &[(&str, SqlValue)]) -> Row {
    values
        .iter()
        .map(|(column, value)| ((*column).to_owned(), value.clone()))
        .collect()
}

pub fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_owned())
}
