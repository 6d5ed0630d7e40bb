//! Raw operations handle: the named-parameter SQL executor the stack runs on.

use crate::value::{Row, SqlValue};

/// Named parameters for one statement, in placeholder order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SqlParameters {
    values: Vec<(String, SqlValue)>,
}

impl SqlParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the value bound to `name`.
    pub fn add(&mut self, name: impl Into<String>, value: SqlValue) {
        let name = name.into();
        if let Some(slot) = self.values.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.values.push((name, value));
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.add(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Synchronous SQL executor with named parameters (`:name` placeholders).
///
/// Implementations wrap a concrete driver; errors are reported as opaque
/// `anyhow::Error` values and surface as `RepositoryError::Operations`.
pub trait SqlOperations: Send + Sync {
    /// Metadata probe: the product name reported by the connected database,
    /// e.g. `PostgreSQL`, `MySQL`, `MariaDB`, `SQLite`.
    ///
    /// # Errors
    /// Returns an error if the metadata cannot be read.
    fn product_name(&self) -> anyhow::Result<String>;

    /// Run a query and return all rows.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    fn query(&self, sql: &str, params: &SqlParameters) -> anyhow::Result<Vec<Row>>;

    /// Run a DML statement and return the affected row count.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    fn update(&self, sql: &str, params: &SqlParameters) -> anyhow::Result<u64>;

    /// Run an insert and return the generated key, if the driver reports one.
    /// `key_columns` is empty unless the driver needs them spelled out.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    fn insert_returning_key(
        &self,
        sql: &str,
        params: &SqlParameters,
        key_columns: &[String],
    ) -> anyhow::Result<Option<SqlValue>>;
}
