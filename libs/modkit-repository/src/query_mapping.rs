//! Per-entity row mappers applied to loaded records.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::value::EntityRecord;

/// Post-processes a record after it has been read and converted.
pub trait RowMapper: Send + Sync {
    /// # Errors
    /// Returns an error if the record cannot be mapped.
    fn map_row(&self, record: EntityRecord) -> Result<EntityRecord>;
}

/// Row mappers keyed by entity name.
///
/// An absent configuration is never represented as "unset": the stack always
/// carries at least [`QueryMappingConfiguration::empty`].
#[derive(Clone, Default)]
pub struct QueryMappingConfiguration {
    mappers: BTreeMap<String, Arc<dyn RowMapper>>,
}

impl QueryMappingConfiguration {
    /// Configuration without any mappers.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mapper(mut self, entity: impl Into<String>, mapper: Arc<dyn RowMapper>) -> Self {
        self.mappers.insert(entity.into(), mapper);
        self
    }

    #[must_use]
    pub fn row_mapper(&self, entity: &str) -> Option<Arc<dyn RowMapper>> {
        self.mappers.get(entity).cloned()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

impl fmt::Debug for QueryMappingConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.mappers.keys()).finish()
    }
}
