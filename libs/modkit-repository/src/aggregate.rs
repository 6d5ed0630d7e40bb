//! Aggregate persistence façade and its lifecycle notifications.

use std::fmt;
use std::sync::Arc;

use crate::access::DataAccessStrategy;
use crate::converter::TypeConverter;
use crate::mapping::MappingContext;
use crate::value::{EntityRecord, Row, SqlValue};
use crate::{RepositoryError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateEventKind {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
    AfterLoad,
}

impl fmt::Display for AggregateEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AggregateEventKind::BeforeSave => "before_save",
            AggregateEventKind::AfterSave => "after_save",
            AggregateEventKind::BeforeDelete => "before_delete",
            AggregateEventKind::AfterDelete => "after_delete",
            AggregateEventKind::AfterLoad => "after_load",
        })
    }
}

/// Lifecycle notification for one aggregate root.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateEvent {
    pub kind: AggregateEventKind,
    pub entity: String,
    /// `None` before the id of a new aggregate is known.
    pub id: Option<SqlValue>,
}

impl AggregateEvent {
    #[must_use]
    pub fn new(kind: AggregateEventKind, entity: impl Into<String>, id: Option<SqlValue>) -> Self {
        Self {
            kind,
            entity: entity.into(),
            id,
        }
    }
}

/// Fire-and-forget event sink.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, event: AggregateEvent);
}

/// Publisher used when none is configured: events become `debug` traces.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPublisher;

impl NotificationPublisher for TracingPublisher {
    fn publish(&self, event: AggregateEvent) {
        tracing::debug!(
            event = %event.kind,
            entity = %event.entity,
            id = ?event.id,
            "Aggregate event"
        );
    }
}

/// Aggregate-level persistence: saves, loads and deletes whole roots.
pub trait AggregateOperations: Send + Sync {
    /// Insert when the id is null or absent, update otherwise; returns the id.
    ///
    /// # Errors
    /// Returns `RepositoryError::IncorrectUpdate` if an update matched no row,
    /// `RepositoryError::MissingGeneratedKey` if an insert without an id
    /// produced no key, or any conversion or statement error.
    fn save(&self, entity: &str, row: Row) -> Result<SqlValue>;

    /// # Errors
    /// Returns an error if conversion or the statement fails.
    fn find_by_id(&self, entity: &str, id: &SqlValue) -> Result<Option<EntityRecord>>;

    /// # Errors
    /// Returns an error if conversion or the statement fails.
    fn find_all(&self, entity: &str) -> Result<Vec<EntityRecord>>;

    /// `true` when a row was deleted.
    ///
    /// # Errors
    /// Returns an error if conversion or the statement fails.
    fn delete_by_id(&self, entity: &str, id: &SqlValue) -> Result<bool>;

    /// # Errors
    /// Returns an error if the statement fails.
    fn count(&self, entity: &str) -> Result<u64>;

    /// # Errors
    /// Returns an error if conversion or the statement fails.
    fn exists_by_id(&self, entity: &str, id: &SqlValue) -> Result<bool>;
}

/// Default aggregate operations over a data access strategy.
pub struct AggregateTemplate {
    publisher: Arc<dyn NotificationPublisher>,
    mapping: Arc<MappingContext>,
    converter: Arc<dyn TypeConverter>,
    access_strategy: Arc<dyn DataAccessStrategy>,
}

impl AggregateTemplate {
    #[must_use]
    pub fn new(
        publisher: Arc<dyn NotificationPublisher>,
        mapping: Arc<MappingContext>,
        converter: Arc<dyn TypeConverter>,
        access_strategy: Arc<dyn DataAccessStrategy>,
    ) -> Self {
        Self {
            publisher,
            mapping,
            converter,
            access_strategy,
        }
    }

    fn publish(&self, kind: AggregateEventKind, entity: &str, id: Option<SqlValue>) {
        self.publisher.publish(AggregateEvent::new(kind, entity, id));
    }

    fn loaded(&self, entity: &str, record: &EntityRecord, id_column: &str) {
        self.publish(AggregateEventKind::AfterLoad, entity, record.get(id_column).cloned());
    }
}

impl fmt::Debug for AggregateTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateTemplate")
            .field("entities", &self.mapping.len())
            .finish_non_exhaustive()
    }
}

impl AggregateOperations for AggregateTemplate {
    fn save(&self, entity: &str, row: Row) -> Result<SqlValue> {
        let mapped = self.mapping.required_entity(entity)?;
        let id_column = mapped.id_column();
        let id = row.get(id_column).filter(|v| !v.is_null()).cloned();

        self.publish(AggregateEventKind::BeforeSave, entity, id.clone());

        let id = match id {
            Some(id) => {
                if !self.access_strategy.update(entity, &row)? {
                    return Err(RepositoryError::IncorrectUpdate {
                        entity: entity.to_owned(),
                    });
                }
                id
            }
            None => match self.access_strategy.insert(entity, &row)? {
                // Generated keys come back in the driver's representation.
                Some(generated) => match mapped.property(id_column) {
                    Some(property) => self.converter.read_value(generated, property)?,
                    None => generated,
                },
                // The row is written but cannot be addressed; `AfterSave` is not published.
                None => {
                    return Err(RepositoryError::MissingGeneratedKey {
                        entity: entity.to_owned(),
                    });
                }
            },
        };

        self.publish(AggregateEventKind::AfterSave, entity, Some(id.clone()));
        Ok(id)
    }

    fn find_by_id(&self, entity: &str, id: &SqlValue) -> Result<Option<EntityRecord>> {
        let mapped = self.mapping.required_entity(entity)?;
        let found = self.access_strategy.find_by_id(entity, id)?;
        if let Some(record) = &found {
            self.loaded(entity, record, mapped.id_column());
        }
        Ok(found)
    }

    fn find_all(&self, entity: &str) -> Result<Vec<EntityRecord>> {
        let mapped = self.mapping.required_entity(entity)?;
        let records = self.access_strategy.find_all(entity)?;
        for record in &records {
            self.loaded(entity, record, mapped.id_column());
        }
        Ok(records)
    }

    fn delete_by_id(&self, entity: &str, id: &SqlValue) -> Result<bool> {
        self.mapping.required_entity(entity)?;
        self.publish(AggregateEventKind::BeforeDelete, entity, Some(id.clone()));
        let deleted = self.access_strategy.delete_by_id(entity, id)? > 0;
        self.publish(AggregateEventKind::AfterDelete, entity, Some(id.clone()));
        Ok(deleted)
    }

    fn count(&self, entity: &str) -> Result<u64> {
        self.access_strategy.count(entity)
    }

    fn exists_by_id(&self, entity: &str, id: &SqlValue) -> Result<bool> {
        self.access_strategy.exists_by_id(entity, id)
    }
}
