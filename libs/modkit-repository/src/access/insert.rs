use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::dialect::Dialect;
use crate::operations::{SqlOperations, SqlParameters};
use crate::value::SqlValue;

/// How a single insert is executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertMode {
    /// The id is supplied, or the driver cannot report generated keys.
    Plain,
    /// Ask the driver for the generated key. `key_columns` is empty unless
    /// the driver needs them named.
    GeneratedKeys { key_columns: Vec<String> },
}

/// Insert execution bound to an operations handle.
pub struct InsertStrategy {
    operations: Arc<dyn SqlOperations>,
    mode: InsertMode,
}

impl InsertStrategy {
    #[must_use]
    pub fn mode(&self) -> &InsertMode {
        &self.mode
    }

    /// Run the insert; returns the generated id when one was requested and reported.
    ///
    /// # Errors
    /// Returns `RepositoryError::Operations` if the statement fails.
    pub fn execute(&self, sql: &str, params: &SqlParameters) -> Result<Option<SqlValue>> {
        match &self.mode {
            InsertMode::Plain => {
                self.operations.update(sql, params)?;
                Ok(None)
            }
            InsertMode::GeneratedKeys { key_columns } => {
                Ok(self.operations.insert_returning_key(sql, params, key_columns)?)
            }
        }
    }
}

impl fmt::Debug for InsertStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertStrategy")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Chooses the insert mode from the dialect's id generation capabilities.
pub struct InsertStrategyFactory {
    operations: Arc<dyn SqlOperations>,
    dialect: Arc<dyn Dialect>,
}

impl InsertStrategyFactory {
    #[must_use]
    pub fn new(operations: Arc<dyn SqlOperations>, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            operations,
            dialect,
        }
    }

    #[must_use]
    pub fn insert_strategy(&self, id_supplied: bool, id_column: &str) -> InsertStrategy {
        let id_generation = self.dialect.id_generation();

        let mode = if id_supplied || !id_generation.supports_generated_keys {
            InsertMode::Plain
        } else if id_generation.driver_requires_key_column_names {
            InsertMode::GeneratedKeys {
                key_columns: vec![self.dialect.identifier_processing().standardize(id_column)],
            }
        } else {
            InsertMode::GeneratedKeys {
                key_columns: Vec::new(),
            }
        };

        InsertStrategy {
            operations: self.operations.clone(),
            mode,
        }
    }
}
