//! Row ↔ object type conversion and relation resolution.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::assembler::Role;
use crate::conversions::ConversionRegistry;
use crate::dialect::{ArrayColumns, DefaultArraySupport, Dialect, IdentifierProcessing};
use crate::mapping::{MappingContext, PersistentEntity, PersistentProperty, PropertyKind, RelationPath};
use crate::value::{EntityRecord, Row, SqlValue, ValueType};
use crate::{RepositoryError, Result};

/// Loads the rows of a related entity that point back at an owner.
pub trait RelationResolver: Send + Sync {
    /// # Errors
    /// Returns an error if the related rows cannot be loaded.
    fn find_all_by_path(&self, owner_id: &SqlValue, path: &RelationPath) -> Result<Vec<Row>>;
}

/// Forward reference to a relation resolver that only exists once the
/// repository factory has been built.
///
/// Created empty, handed to the type converter, and assigned exactly once.
/// The target is held weakly: its owner (the resolved stack) keeps it
/// alive, so the strategy → converter → resolver chain never owns itself.
/// Calls before assignment fail with `NotYetInitialized`, calls after the
/// owner is gone fail with `Released`.
#[derive(Default)]
pub struct DeferredRelationResolver {
    target: OnceLock<Weak<dyn RelationResolver>>,
}

impl DeferredRelationResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill in the target. Only a weak reference is kept; the caller must
    /// keep `resolver` alive for as long as relations are loaded.
    ///
    /// # Errors
    /// Returns `RepositoryError::InvalidOverride` if a target was already assigned.
    pub fn assign(&self, resolver: &Arc<dyn RelationResolver>) -> Result<()> {
        self.target.set(Arc::downgrade(resolver)).map_err(|_| {
            RepositoryError::invalid_override(Role::RelationResolver, "already assigned")
        })
    }

    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.target.get().is_some()
    }
}

impl fmt::Debug for DeferredRelationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRelationResolver")
            .field("assigned", &self.is_assigned())
            .finish()
    }
}

impl RelationResolver for DeferredRelationResolver {
    fn find_all_by_path(&self, owner_id: &SqlValue, path: &RelationPath) -> Result<Vec<Row>> {
        let target = self.target.get().ok_or(RepositoryError::NotYetInitialized {
            role: Role::RelationResolver,
        })?;
        let target = target.upgrade().ok_or(RepositoryError::Released {
            role: Role::RelationResolver,
        })?;
        target.find_all_by_path(owner_id, path)
    }
}

/// Converts between database rows and mapped values.
pub trait TypeConverter: Send + Sync {
    fn mapping_context(&self) -> &MappingContext;

    fn conversions(&self) -> &ConversionRegistry;

    fn identifier_processing(&self) -> IdentifierProcessing;

    /// SQL type name for arrays of `element`.
    fn array_type_name(&self, element: ValueType) -> String;

    /// Convert a mapped value into its database representation.
    ///
    /// # Errors
    /// Returns `RepositoryError::Conversion` if the value cannot be written.
    fn write_value(&self, value: SqlValue, property: &PersistentProperty) -> Result<SqlValue>;

    /// Convert a database value into the property's mapped type.
    ///
    /// # Errors
    /// Returns `RepositoryError::Conversion` if the value cannot be read.
    fn read_value(&self, value: SqlValue, property: &PersistentProperty) -> Result<SqlValue>;

    /// Read a row of `entity` without touching relations.
    ///
    /// # Errors
    /// Returns `RepositoryError::Conversion` if a column cannot be read.
    fn read_row(&self, entity: &PersistentEntity, row: Row) -> Result<Row> {
        row.into_iter()
            .map(|(column, value)| {
                let value = match entity.property(&column) {
                    Some(property) => self.read_value(value, property)?,
                    None => value,
                };
                Ok((column, value))
            })
            .collect()
    }

    /// Read a root row and load one level of relations.
    ///
    /// # Errors
    /// Returns an error if a column cannot be read or related rows cannot be loaded.
    fn read_entity(&self, entity: &PersistentEntity, row: Row) -> Result<EntityRecord>;
}

/// Default converter built from the mapping context, a relation resolver,
/// the conversion registry and the dialect.
pub struct BasicTypeConverter {
    mapping: Arc<MappingContext>,
    relation_resolver: Arc<dyn RelationResolver>,
    conversions: Arc<ConversionRegistry>,
    array_columns: Arc<dyn ArrayColumns>,
    identifier_processing: IdentifierProcessing,
}

impl BasicTypeConverter {
    /// Dialects without native array support get [`DefaultArraySupport`].
    #[must_use]
    pub fn new(
        mapping: Arc<MappingContext>,
        relation_resolver: Arc<dyn RelationResolver>,
        conversions: Arc<ConversionRegistry>,
        dialect: &dyn Dialect,
    ) -> Self {
        let array_columns = dialect
            .array_support()
            .unwrap_or_else(|| Arc::new(DefaultArraySupport));

        Self {
            mapping,
            relation_resolver,
            conversions,
            array_columns,
            identifier_processing: dialect.identifier_processing(),
        }
    }

    #[must_use]
    pub fn array_columns(&self) -> &dyn ArrayColumns {
        self.array_columns.as_ref()
    }

    fn write_simple(&self, value: SqlValue, property: &PersistentProperty) -> Result<SqlValue> {
        let Some(value_type) = value.value_type() else {
            return Ok(value);
        };

        if let Some(converter) = self.conversions.writing_converter(value_type) {
            return converter
                .convert(&value)
                .ok_or_else(|| conversion_error(property, converter.name));
        }

        if self.conversions.is_simple_type(value_type) {
            Ok(value)
        } else {
            Err(conversion_error(
                property,
                &format!("no writing conversion for {}", value_type.sql_name()),
            ))
        }
    }

    fn read_simple(&self, value: SqlValue, property: &PersistentProperty) -> Result<SqlValue> {
        let Some(stored) = value.value_type() else {
            return Ok(value);
        };
        if stored == property.value_type {
            return Ok(value);
        }

        match self.conversions.reading_converter(stored, property.value_type) {
            Some(converter) => converter
                .convert(&value)
                .ok_or_else(|| conversion_error(property, converter.name)),
            // Drivers may hand back compatible representations; keep them as-is.
            None => Ok(value),
        }
    }
}

impl fmt::Debug for BasicTypeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicTypeConverter")
            .field("entities", &self.mapping.len())
            .field("array_columns", &self.array_columns)
            .field("identifier_processing", &self.identifier_processing)
            .finish_non_exhaustive()
    }
}

impl TypeConverter for BasicTypeConverter {
    fn mapping_context(&self) -> &MappingContext {
        &self.mapping
    }

    fn conversions(&self) -> &ConversionRegistry {
        &self.conversions
    }

    fn identifier_processing(&self) -> IdentifierProcessing {
        self.identifier_processing
    }

    fn array_type_name(&self, element: ValueType) -> String {
        self.array_columns.array_type_name(element)
    }

    fn write_value(&self, value: SqlValue, property: &PersistentProperty) -> Result<SqlValue> {
        match (&property.kind, value) {
            (_, SqlValue::Null) => Ok(SqlValue::Null),
            (PropertyKind::Array { .. }, SqlValue::Array(items)) => {
                if !self.array_columns.is_supported() {
                    return Err(conversion_error(property, "arrays are not supported"));
                }
                items
                    .into_iter()
                    .map(|item| self.write_simple(item, property))
                    .collect::<Result<Vec<_>>>()
                    .map(SqlValue::Array)
            }
            (PropertyKind::Array { .. }, _) => Err(conversion_error(property, "expected an array")),
            (_, value) => self.write_simple(value, property),
        }
    }

    fn read_value(&self, value: SqlValue, property: &PersistentProperty) -> Result<SqlValue> {
        match value {
            SqlValue::Array(items) => items
                .into_iter()
                .map(|item| self.read_simple(item, property))
                .collect::<Result<Vec<_>>>()
                .map(SqlValue::Array),
            value => self.read_simple(value, property),
        }
    }

    fn read_entity(&self, entity: &PersistentEntity, row: Row) -> Result<EntityRecord> {
        let mut record = EntityRecord::new(self.read_row(entity, row)?);

        let owner_id = record
            .get(entity.id_column())
            .cloned()
            .unwrap_or(SqlValue::Null);
        if owner_id.is_null() {
            return Ok(record);
        }

        for path in entity.relations() {
            let target = self.mapping.required_entity(&path.target)?;
            let rows = self
                .relation_resolver
                .find_all_by_path(&owner_id, &path)?
                .into_iter()
                .map(|row| self.read_row(&target, row))
                .collect::<Result<Vec<_>>>()?;
            record.relations.insert(path.property, rows);
        }

        Ok(record)
    }
}

fn conversion_error(property: &PersistentProperty, reason: &str) -> RepositoryError {
    RepositoryError::Conversion {
        property: property.name.clone(),
        reason: reason.to_owned(),
    }
}
