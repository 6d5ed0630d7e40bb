//! Request-time repositories built on top of a resolved stack.

use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::aggregate::AggregateOperations;
use crate::assembler::ResolvedStack;
use crate::callbacks::EntityCallbacks;
use crate::converter::RelationResolver;
use crate::dialect::Dialect;
use crate::mapping::PersistentEntity;
use crate::operations::SqlOperations;
use crate::query_mapping::{QueryMappingConfiguration, RowMapper};
use crate::value::{EntityRecord, Row, SqlValue};

/// Produces repositories for the entities of a resolved stack.
pub struct RepositoryFactory {
    stack: ResolvedStack,
    query_mapping: QueryMappingConfiguration,
    callbacks: EntityCallbacks,
}

impl RepositoryFactory {
    /// Take over a stack and close its relation resolver loop: the data
    /// access strategy becomes the target of the deferred resolver handed to
    /// the default type converter. The stack keeps the strategy alive; the
    /// resolver only refers to it weakly.
    ///
    /// # Errors
    /// Returns `RepositoryError::InvalidOverride` if the stack's deferred
    /// resolver was already assigned by another factory.
    pub fn new(stack: ResolvedStack) -> Result<Self> {
        if let Some(deferred) = stack.relation_resolver() {
            let resolver: Arc<dyn RelationResolver> = stack.data_access_strategy().clone();
            deferred.assign(&resolver)?;
        }

        Ok(Self {
            query_mapping: stack.query_mapping_configuration().clone(),
            callbacks: stack.entity_callbacks().cloned().unwrap_or_default(),
            stack,
        })
    }

    /// Replace the query mapping configuration for repositories created afterwards.
    pub fn set_query_mapping_configuration(&mut self, config: QueryMappingConfiguration) {
        self.query_mapping = config;
    }

    /// Replace the entity callbacks for repositories created afterwards.
    pub fn set_entity_callbacks(&mut self, callbacks: EntityCallbacks) {
        self.callbacks = callbacks;
    }

    #[must_use]
    pub fn stack(&self) -> &ResolvedStack {
        &self.stack
    }

    #[must_use]
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        self.stack.dialect()
    }

    #[must_use]
    pub fn operations(&self) -> Option<&Arc<dyn SqlOperations>> {
        self.stack.operations()
    }

    /// # Errors
    /// Returns `RepositoryError::UnknownEntity` if `entity` is not mapped.
    pub fn repository(&self, entity: &str) -> Result<Repository> {
        let mapped = self.stack.mapping_context().required_entity(entity)?;
        tracing::debug!(entity = %entity, table = %mapped.table(), "Created repository");

        Ok(Repository {
            row_mapper: self.query_mapping.row_mapper(entity),
            entity: mapped,
            operations: self.stack.aggregate_operations().clone(),
            callbacks: self.callbacks.clone(),
        })
    }
}

impl fmt::Debug for RepositoryFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryFactory")
            .field("stack", &self.stack)
            .field("query_mapping", &self.query_mapping)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

/// CRUD access to one aggregate root.
#[derive(Clone)]
pub struct Repository {
    entity: Arc<PersistentEntity>,
    operations: Arc<dyn AggregateOperations>,
    callbacks: EntityCallbacks,
    row_mapper: Option<Arc<dyn RowMapper>>,
}

impl Repository {
    #[must_use]
    pub fn entity(&self) -> &PersistentEntity {
        &self.entity
    }

    /// Insert or update `row`; returns the aggregate id.
    ///
    /// # Errors
    /// Returns callback, conversion and statement errors.
    pub fn save(&self, mut row: Row) -> Result<SqlValue> {
        self.callbacks.before_save(&self.entity, &mut row)?;
        self.operations.save(self.entity.name(), row)
    }

    /// # Errors
    /// Returns mapper, callback, conversion and statement errors.
    pub fn find_by_id(&self, id: &SqlValue) -> Result<Option<EntityRecord>> {
        self.operations
            .find_by_id(self.entity.name(), id)?
            .map(|record| self.loaded(record))
            .transpose()
    }

    /// # Errors
    /// Returns mapper, callback, conversion and statement errors.
    pub fn find_all(&self) -> Result<Vec<EntityRecord>> {
        self.operations
            .find_all(self.entity.name())?
            .into_iter()
            .map(|record| self.loaded(record))
            .collect()
    }

    /// # Errors
    /// Returns conversion and statement errors.
    pub fn exists_by_id(&self, id: &SqlValue) -> Result<bool> {
        self.operations.exists_by_id(self.entity.name(), id)
    }

    /// # Errors
    /// Returns conversion and statement errors.
    pub fn delete_by_id(&self, id: &SqlValue) -> Result<bool> {
        self.operations.delete_by_id(self.entity.name(), id)
    }

    /// # Errors
    /// Returns statement errors.
    pub fn count(&self) -> Result<u64> {
        self.operations.count(self.entity.name())
    }

    fn loaded(&self, record: EntityRecord) -> Result<EntityRecord> {
        let mut record = match &self.row_mapper {
            Some(mapper) => mapper.map_row(record)?,
            None => record,
        };
        self.callbacks.after_load(&self.entity, &mut record)?;
        Ok(record)
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &self.entity.name())
            .field("row_mapper", &self.row_mapper.is_some())
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}
