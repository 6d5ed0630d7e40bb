//! Statement generation per mapped entity.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::converter::TypeConverter;
use crate::dialect::Dialect;
use crate::mapping::{MappingContext, PersistentEntity, PropertyKind};

/// One column as it appears in generated statements.
#[derive(Clone, Debug, PartialEq, Eq)]
struct ColumnSql {
    column: String,
    quoted: String,
    placeholder: String,
}

/// Pre-rendered statements for one entity.
///
/// Parameters are named after the unquoted column name (`:column`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlGenerator {
    table: String,
    id: ColumnSql,
    columns: Vec<ColumnSql>,
    find_by_id: String,
    find_all: String,
    update: String,
    delete_by_id: String,
    count: String,
    exists_by_id: String,
}

impl SqlGenerator {
    fn new(entity: &PersistentEntity, converter: &dyn TypeConverter, dialect: &dyn Dialect) -> Self {
        let identifiers = dialect.identifier_processing();
        let native_arrays = dialect.array_support().is_some();

        let columns: Vec<ColumnSql> = entity
            .columns()
            .map(|p| {
                let placeholder = match p.kind {
                    PropertyKind::Array { element } if native_arrays => format!(
                        "CAST(:{} AS {}[])",
                        p.column,
                        converter.array_type_name(element)
                    ),
                    _ => format!(":{}", p.column),
                };
                ColumnSql {
                    column: p.column.clone(),
                    quoted: identifiers.process(&p.column),
                    placeholder,
                }
            })
            .collect();

        let table = identifiers.process(entity.table());
        let id = ColumnSql {
            column: entity.id_column().to_owned(),
            quoted: identifiers.process(entity.id_column()),
            placeholder: format!(":{}", entity.id_column()),
        };

        let select_list = columns
            .iter()
            .map(|c| c.quoted.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let id_predicate = format!("{} = {}", id.quoted, id.placeholder);

        let assignments = columns
            .iter()
            .filter(|c| c.column != id.column)
            .map(|c| format!("{} = {}", c.quoted, c.placeholder))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            find_by_id: format!("SELECT {select_list} FROM {table} WHERE {id_predicate}"),
            find_all: format!("SELECT {select_list} FROM {table}"),
            update: format!("UPDATE {table} SET {assignments} WHERE {id_predicate}"),
            delete_by_id: format!("DELETE FROM {table} WHERE {id_predicate}"),
            count: format!("SELECT COUNT(*) FROM {table}"),
            exists_by_id: format!("SELECT COUNT(*) FROM {table} WHERE {id_predicate}"),
            table,
            id,
            columns,
        }
    }

    #[must_use]
    pub fn find_by_id(&self) -> &str {
        &self.find_by_id
    }

    #[must_use]
    pub fn find_all(&self) -> &str {
        &self.find_all
    }

    /// Select every row whose `column` equals the `:column` parameter.
    #[must_use]
    pub fn find_all_by_column(&self, column: &str) -> String {
        let quoted = self
            .columns
            .iter()
            .find(|c| c.column == column)
            .map_or_else(|| column.to_owned(), |c| c.quoted.clone());
        format!("{} WHERE {quoted} = :{column}", self.find_all)
    }

    /// Insert the given columns; unknown column names are ignored.
    #[must_use]
    pub fn insert<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> String {
        let wanted: Vec<&str> = columns.into_iter().collect();
        let (names, values): (Vec<&str>, Vec<&str>) = self
            .columns
            .iter()
            .filter(|c| wanted.contains(&c.column.as_str()))
            .map(|c| (c.quoted.as_str(), c.placeholder.as_str()))
            .unzip();

        if names.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES", self.table);
        }
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            names.join(", "),
            values.join(", ")
        )
    }

    #[must_use]
    pub fn update(&self) -> &str {
        &self.update
    }

    #[must_use]
    pub fn delete_by_id(&self) -> &str {
        &self.delete_by_id
    }

    #[must_use]
    pub fn count(&self) -> &str {
        &self.count
    }

    #[must_use]
    pub fn exists_by_id(&self) -> &str {
        &self.exists_by_id
    }

    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id.column
    }
}

/// Hands out one cached [`SqlGenerator`] per entity.
pub struct SqlGeneratorSource {
    mapping: Arc<MappingContext>,
    converter: Arc<dyn TypeConverter>,
    dialect: Arc<dyn Dialect>,
    cache: DashMap<String, Arc<SqlGenerator>>,
}

impl SqlGeneratorSource {
    #[must_use]
    pub fn new(
        mapping: Arc<MappingContext>,
        converter: Arc<dyn TypeConverter>,
        dialect: Arc<dyn Dialect>,
    ) -> Self {
        Self {
            mapping,
            converter,
            dialect,
            cache: DashMap::new(),
        }
    }

    /// # Errors
    /// Returns `RepositoryError::UnknownEntity` if `entity` is not mapped.
    pub fn generator_for(&self, entity: &str) -> Result<Arc<SqlGenerator>> {
        if let Some(cached) = self.cache.get(entity) {
            return Ok(cached.clone());
        }

        let mapped = self.mapping.required_entity(entity)?;
        let generator = self
            .cache
            .entry(entity.to_owned())
            .or_insert_with(|| {
                Arc::new(SqlGenerator::new(
                    &mapped,
                    self.converter.as_ref(),
                    self.dialect.as_ref(),
                ))
            })
            .clone();
        Ok(generator)
    }
}

impl fmt::Debug for SqlGeneratorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlGeneratorSource")
            .field("dialect", &self.dialect.name())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
