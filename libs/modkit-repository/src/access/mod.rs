//! Data access strategy: SQL-level persistence of mapped entities.
//!
//! The default strategy is composed from three sub-builders:
//! - [`SqlGeneratorSource`] renders the statements for each entity
//! - [`SqlParametersFactory`] turns rows into converted named parameters
//! - [`InsertStrategyFactory`] picks plain or generated-key inserts

mod factory;
mod insert;
mod params;
mod sql;

pub use factory::DataAccessStrategyFactory;
pub use insert::{InsertMode, InsertStrategy, InsertStrategyFactory};
pub use params::SqlParametersFactory;
pub use sql::{SqlGenerator, SqlGeneratorSource};

use std::fmt;
use std::sync::Arc;

use crate::converter::{RelationResolver, TypeConverter};
use crate::mapping::RelationPath;
use crate::operations::{SqlOperations, SqlParameters};
use crate::value::{EntityRecord, Row, SqlValue, ValueType};
use crate::{RepositoryError, Result};

/// Entity-level persistence operations. Every strategy is also the source
/// of related rows for the type converter.
pub trait DataAccessStrategy: RelationResolver {
    /// Insert a row; returns the generated id if the database produced one.
    ///
    /// # Errors
    /// Returns an error if conversion or the statement fails.
    fn insert(&self, entity: &str, row: &Row) -> Result<Option<SqlValue>>;

    /// Update a row by id; `false` when no row was affected.
    ///
    /// # Errors
    /// Returns an error if conversion or the statement fails.
    fn update(&self, entity: &str, row: &Row) -> Result<bool>;

    /// # Errors
    /// Returns an error if conversion or the statement fails.
    fn delete_by_id(&self, entity: &str, id: &SqlValue) -> Result<u64>;

    /// # Errors
    /// Returns an error if conversion or the statement fails.
    fn find_by_id(&self, entity: &str, id: &SqlValue) -> Result<Option<EntityRecord>>;

    /// # Errors
    /// Returns an error if conversion or the statement fails.
    fn find_all(&self, entity: &str) -> Result<Vec<EntityRecord>>;

    /// # Errors
    /// Returns an error if the statement fails.
    fn count(&self, entity: &str) -> Result<u64>;

    /// # Errors
    /// Returns an error if conversion or the statement fails.
    fn exists_by_id(&self, entity: &str, id: &SqlValue) -> Result<bool>;
}

/// Default strategy over a raw operations handle.
pub struct DefaultDataAccessStrategy {
    sql: Arc<SqlGeneratorSource>,
    converter: Arc<dyn TypeConverter>,
    operations: Arc<dyn SqlOperations>,
    parameters: Arc<SqlParametersFactory>,
    inserts: Arc<InsertStrategyFactory>,
}

impl DefaultDataAccessStrategy {
    fn read_all(&self, entity: &str, rows: Vec<Row>) -> Result<Vec<EntityRecord>> {
        let mapped = self.converter.mapping_context().required_entity(entity)?;
        rows.into_iter()
            .map(|row| self.converter.read_entity(&mapped, row))
            .collect()
    }

    fn scalar(&self, sql: &str, params: &SqlParameters) -> Result<u64> {
        let rows = self.operations.query(sql, params)?;
        match rows.first().and_then(|row| row.values().next()) {
            Some(SqlValue::Integer(n)) => u64::try_from(*n).map_err(|_| RepositoryError::Conversion {
                property: "count".to_owned(),
                reason: format!("negative count {n}"),
            }),
            Some(other) => Err(RepositoryError::Conversion {
                property: "count".to_owned(),
                reason: format!(
                    "expected an integer, got {}",
                    other.value_type().map_or("a non-scalar value", ValueType::sql_name)
                ),
            }),
            None => Ok(0),
        }
    }
}

impl fmt::Debug for DefaultDataAccessStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultDataAccessStrategy")
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}

impl RelationResolver for DefaultDataAccessStrategy {
    fn find_all_by_path(&self, owner_id: &SqlValue, path: &RelationPath) -> Result<Vec<Row>> {
        let generator = self.sql.generator_for(&path.target)?;
        let sql = generator.find_all_by_column(&path.back_reference);
        let params = self
            .parameters
            .for_column(&path.target, &path.back_reference, owner_id)?;

        tracing::trace!(owner = %path.owner, relation = %path.property, "Loading related rows");
        Ok(self.operations.query(&sql, &params)?)
    }
}

impl DataAccessStrategy for DefaultDataAccessStrategy {
    fn insert(&self, entity: &str, row: &Row) -> Result<Option<SqlValue>> {
        let generator = self.sql.generator_for(entity)?;
        let params = self.parameters.for_insert(entity, row)?;
        let id_supplied = params.get(generator.id_column()).is_some();

        let sql = generator.insert(params.names());
        self.inserts
            .insert_strategy(id_supplied, generator.id_column())
            .execute(&sql, &params)
    }

    fn update(&self, entity: &str, row: &Row) -> Result<bool> {
        let generator = self.sql.generator_for(entity)?;
        let params = self.parameters.for_update(entity, row)?;
        Ok(self.operations.update(generator.update(), &params)? > 0)
    }

    fn delete_by_id(&self, entity: &str, id: &SqlValue) -> Result<u64> {
        let generator = self.sql.generator_for(entity)?;
        let params = self.parameters.for_id(entity, id)?;
        Ok(self.operations.update(generator.delete_by_id(), &params)?)
    }

    fn find_by_id(&self, entity: &str, id: &SqlValue) -> Result<Option<EntityRecord>> {
        let generator = self.sql.generator_for(entity)?;
        let params = self.parameters.for_id(entity, id)?;
        let rows = self.operations.query(generator.find_by_id(), &params)?;
        Ok(self.read_all(entity, rows)?.into_iter().next())
    }

    fn find_all(&self, entity: &str) -> Result<Vec<EntityRecord>> {
        let generator = self.sql.generator_for(entity)?;
        let rows = self
            .operations
            .query(generator.find_all(), &SqlParameters::new())?;
        self.read_all(entity, rows)
    }

    fn count(&self, entity: &str) -> Result<u64> {
        let generator = self.sql.generator_for(entity)?;
        self.scalar(generator.count(), &SqlParameters::new())
    }

    fn exists_by_id(&self, entity: &str, id: &SqlValue) -> Result<bool> {
        let generator = self.sql.generator_for(entity)?;
        let params = self.parameters.for_id(entity, id)?;
        Ok(self.scalar(generator.exists_by_id(), &params)? > 0)
    }
}
