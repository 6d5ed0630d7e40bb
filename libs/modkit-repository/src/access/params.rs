use std::sync::Arc;

use crate::Result;
use crate::converter::TypeConverter;
use crate::mapping::MappingContext;
use crate::operations::SqlParameters;
use crate::value::{Row, SqlValue};

/// Turns rows into named statement parameters, writing every value through
/// the type converter.
pub struct SqlParametersFactory {
    mapping: Arc<MappingContext>,
    converter: Arc<dyn TypeConverter>,
}

impl SqlParametersFactory {
    #[must_use]
    pub fn new(mapping: Arc<MappingContext>, converter: Arc<dyn TypeConverter>) -> Self {
        Self { mapping, converter }
    }

    /// Parameters for an insert. A null or absent id is left out so the
    /// database can generate it.
    ///
    /// # Errors
    /// Returns an error if the entity is unknown or a value cannot be written.
    pub fn for_insert(&self, entity: &str, row: &Row) -> Result<SqlParameters> {
        let entity = self.mapping.required_entity(entity)?;
        let mut params = SqlParameters::new();
        for property in entity.columns() {
            let value = row.get(&property.column).cloned().unwrap_or(SqlValue::Null);
            if property.column == entity.id_column() && value.is_null() {
                continue;
            }
            params.add(
                property.column.clone(),
                self.converter.write_value(value, property)?,
            );
        }
        Ok(params)
    }

    /// Parameters for an update: every column, id included.
    ///
    /// # Errors
    /// Returns an error if the entity is unknown or a value cannot be written.
    pub fn for_update(&self, entity: &str, row: &Row) -> Result<SqlParameters> {
        let entity = self.mapping.required_entity(entity)?;
        let mut params = SqlParameters::new();
        for property in entity.columns() {
            let value = row.get(&property.column).cloned().unwrap_or(SqlValue::Null);
            params.add(
                property.column.clone(),
                self.converter.write_value(value, property)?,
            );
        }
        Ok(params)
    }

    /// # Errors
    /// Returns an error if the entity is unknown or the id cannot be written.
    pub fn for_id(&self, entity: &str, id: &SqlValue) -> Result<SqlParameters> {
        let id_column = self.mapping.required_entity(entity)?.id_column().to_owned();
        self.for_column(entity, &id_column, id)
    }

    /// A single parameter named after `column`. Columns the entity does not
    /// map are bound unconverted.
    ///
    /// # Errors
    /// Returns an error if the entity is unknown or the value cannot be written.
    pub fn for_column(&self, entity: &str, column: &str, value: &SqlValue) -> Result<SqlParameters> {
        let entity = self.mapping.required_entity(entity)?;
        let value = match entity.property(column) {
            Some(property) => self.converter.write_value(value.clone(), property)?,
            None => value.clone(),
        };
        Ok(SqlParameters::new().with(column, value))
    }
}
