use std::sync::Arc;

use super::{
    DataAccessStrategy, DefaultDataAccessStrategy, InsertStrategyFactory, SqlGeneratorSource,
    SqlParametersFactory,
};
use crate::converter::TypeConverter;
use crate::operations::SqlOperations;

/// Composes the default data access strategy from its sub-builders.
pub struct DataAccessStrategyFactory {
    sql: Arc<SqlGeneratorSource>,
    converter: Arc<dyn TypeConverter>,
    operations: Arc<dyn SqlOperations>,
    parameters: Arc<SqlParametersFactory>,
    inserts: Arc<InsertStrategyFactory>,
}

impl DataAccessStrategyFactory {
    #[must_use]
    pub fn new(
        sql: SqlGeneratorSource,
        converter: Arc<dyn TypeConverter>,
        operations: Arc<dyn SqlOperations>,
        parameters: SqlParametersFactory,
        inserts: InsertStrategyFactory,
    ) -> Self {
        Self {
            sql: Arc::new(sql),
            converter,
            operations,
            parameters: Arc::new(parameters),
            inserts: Arc::new(inserts),
        }
    }

    #[must_use]
    pub fn create(&self) -> Arc<dyn DataAccessStrategy> {
        Arc::new(DefaultDataAccessStrategy {
            sql: self.sql.clone(),
            converter: self.converter.clone(),
            operations: self.operations.clone(),
            parameters: self.parameters.clone(),
            inserts: self.inserts.clone(),
        })
    }
}
