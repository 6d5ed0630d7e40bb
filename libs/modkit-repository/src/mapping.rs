//! Object-to-relational mapping model.
//!
//! The mapping context is supplied by the caller and never mutated after
//! assembly. Entities are addressed by their logical name.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::value::ValueType;
use crate::{RepositoryError, Result};

/// How a property is stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    /// Single column holding a simple value.
    Value,
    /// Single column holding an array of `element` values.
    Array { element: ValueType },
    /// Rows of another entity pointing back at the owner through `back_reference`.
    Relation {
        target: String,
        back_reference: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistentProperty {
    pub name: String,
    pub column: String,
    pub value_type: ValueType,
    pub kind: PropertyKind,
}

impl PersistentProperty {
    #[must_use]
    pub fn is_column(&self) -> bool {
        !matches!(self.kind, PropertyKind::Relation { .. })
    }
}

/// Mapping of one aggregate root or child entity to a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistentEntity {
    name: String,
    table: String,
    id_column: String,
    properties: Vec<PersistentProperty>,
}

impl PersistentEntity {
    /// Start an entity mapping with its id column.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        id_column: impl Into<String>,
        id_type: ValueType,
    ) -> Self {
        let id_column = id_column.into();
        Self {
            name: name.into(),
            table: table.into(),
            properties: vec![PersistentProperty {
                name: id_column.clone(),
                column: id_column.clone(),
                value_type: id_type,
                kind: PropertyKind::Value,
            }],
            id_column,
        }
    }

    #[must_use]
    pub fn column(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        self.properties.push(PersistentProperty {
            column: name.clone(),
            name,
            value_type,
            kind: PropertyKind::Value,
        });
        self
    }

    #[must_use]
    pub fn array(mut self, name: impl Into<String>, element: ValueType) -> Self {
        let name = name.into();
        self.properties.push(PersistentProperty {
            column: name.clone(),
            name,
            value_type: element,
            kind: PropertyKind::Array { element },
        });
        self
    }

    #[must_use]
    pub fn relation(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        back_reference: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.properties.push(PersistentProperty {
            column: name.clone(),
            name,
            value_type: ValueType::Json,
            kind: PropertyKind::Relation {
                target: target.into(),
                back_reference: back_reference.into(),
            },
        });
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    #[must_use]
    pub fn properties(&self) -> &[PersistentProperty] {
        &self.properties
    }

    /// Properties stored in this entity's own table, id first.
    pub fn columns(&self) -> impl Iterator<Item = &PersistentProperty> {
        self.properties.iter().filter(|p| p.is_column())
    }

    pub fn relations(&self) -> impl Iterator<Item = RelationPath> + '_ {
        self.properties.iter().filter_map(|p| match &p.kind {
            PropertyKind::Relation {
                target,
                back_reference,
            } => Some(RelationPath {
                owner: self.name.clone(),
                property: p.name.clone(),
                target: target.clone(),
                back_reference: back_reference.clone(),
            }),
            _ => None,
        })
    }

    #[must_use]
    pub fn property(&self, column: &str) -> Option<&PersistentProperty> {
        self.properties.iter().find(|p| p.column == column)
    }
}

/// Navigation from an owning entity to the rows of a related entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationPath {
    pub owner: String,
    pub property: String,
    pub target: String,
    pub back_reference: String,
}

/// The schema model every stack is assembled against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappingContext {
    entities: BTreeMap<String, Arc<PersistentEntity>>,
}

impl MappingContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity; a later entity with the same name replaces the earlier one.
    #[must_use]
    pub fn with_entity(mut self, entity: PersistentEntity) -> Self {
        self.entities
            .insert(entity.name().to_owned(), Arc::new(entity));
        self
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<Arc<PersistentEntity>> {
        self.entities.get(name).cloned()
    }

    /// # Errors
    /// Returns `RepositoryError::UnknownEntity` if no entity is mapped under `name`.
    pub fn required_entity(&self, name: &str) -> Result<Arc<PersistentEntity>> {
        self.entity(name)
            .ok_or_else(|| RepositoryError::UnknownEntity(name.to_owned()))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<PersistentEntity>> {
        self.entities.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn relation_properties_are_not_columns() {
        let order = PersistentEntity::new("order", "orders", "id", ValueType::Integer)
            .column("customer", ValueType::Text)
            .relation("lines", "order_line", "order_id");

        let columns: Vec<_> = order.columns().map(|p| p.column.as_str()).collect();
        assert_eq!(columns, vec!["id", "customer"]);

        let relations: Vec<_> = order.relations().collect();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].target, "order_line");
        assert_eq!(relations[0].back_reference, "order_id");
    }

    #[test]
    fn required_entity_reports_unknown_name() {
        let ctx = MappingContext::new();
        let err = ctx.required_entity("missing").unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownEntity(name) if name == "missing"));
    }
}
