#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! `ModKit` repository stack assembly.
//!
//! This crate wires the collaborators a repository layer needs at runtime:
//! the SQL dialect, the custom conversions, the row/object type converter,
//! the data access strategy and the aggregate operations façade. Every role
//! can be supplied from the outside, discovered through a [`ComponentLookup`]
//! or built from already resolved upstream roles.
//!
//! Resolution happens once, at startup, in a fixed order:
//!
//! ```text
//! mapping context check
//!   → operations handle → dialect → conversions → type converter
//!   → data access strategy → aggregate operations → query mapping
//!   → RepositoryFactory
//! ```
//!
//! # Example
//! ```rust,ignore
//! use modkit_repository::{RepositoryFactory, StackAssembler, StackOverrides};
//!
//! let overrides = StackOverrides::new()
//!     .with_mapping_context(mapping)
//!     .with_operations(operations);
//!
//! let stack = StackAssembler::new().with_lookup(hub).assemble(overrides)?;
//! let factory = RepositoryFactory::new(stack)?;
//! let orders = factory.repository("order")?;
//! ```

pub mod access;
pub mod aggregate;
pub mod assembler;
pub mod callbacks;
pub mod config;
pub mod conversions;
pub mod converter;
pub mod dialect;
pub mod factory;
pub mod lookup;
pub mod mapping;
pub mod operations;
pub mod query_mapping;
pub mod value;

pub use access::{DataAccessStrategy, DataAccessStrategyFactory};
pub use aggregate::{
    AggregateEvent, AggregateEventKind, AggregateOperations, AggregateTemplate,
    NotificationPublisher, TracingPublisher,
};
pub use assembler::{
    AssemblyHook, ResolutionSource, ResolvedStack, Role, StackAssembler, StackOverrides,
};
pub use callbacks::{EntityCallback, EntityCallbacks};
pub use config::RepositoryConfig;
pub use conversions::{ConversionDirection, ConversionRegistry, Converter, SimpleTypeHolder};
pub use converter::{
    BasicTypeConverter, DeferredRelationResolver, RelationResolver, TypeConverter,
};
pub use dialect::{
    ArrayColumns, DefaultArraySupport, DefaultDialectResolver, Dialect, DialectKind,
    DialectResolver, IdGeneration, IdentifierProcessing,
};
pub use factory::{Repository, RepositoryFactory};
pub use lookup::{ComponentHub, ComponentLookup, ComponentLookupExt};
pub use mapping::{MappingContext, PersistentEntity, PersistentProperty, PropertyKind, RelationPath};
pub use operations::{SqlOperations, SqlParameters};
pub use query_mapping::{QueryMappingConfiguration, RowMapper};
pub use value::{EntityRecord, Row, SqlValue, ValueType};

use thiserror::Error;

/// Library-local result type.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Typed error for stack assembly and the repositories built on top of it.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Missing configuration: no {role} was supplied and none could be resolved")]
    MissingConfiguration { role: Role },

    #[error("Unsupported dialect: no known dialect matches database product '{product}'")]
    UnsupportedDialect { product: String },

    #[error("Invalid override for {role}: {reason}")]
    InvalidOverride { role: Role, reason: String },

    #[error("{role} is not initialized yet")]
    NotYetInitialized { role: Role },

    #[error("{role} is no longer available: the stack that owned it was dropped")]
    Released { role: Role },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Cannot convert property '{property}': {reason}")]
    Conversion { property: String, reason: String },

    #[error("Update of '{entity}' affected no rows")]
    IncorrectUpdate { entity: String },

    #[error("Insert into '{entity}' returned no generated key and no id was supplied")]
    MissingGeneratedKey { entity: String },

    #[error(transparent)]
    Config(#[from] Box<figment::Error>),

    // Driver errors raised by the operations handle are opaque to the stack.
    #[error(transparent)]
    Operations(#[from] anyhow::Error),
}

impl RepositoryError {
    pub(crate) fn missing(role: Role) -> Self {
        Self::MissingConfiguration { role }
    }

    pub(crate) fn invalid_override(role: Role, reason: impl Into<String>) -> Self {
        Self::InvalidOverride {
            role,
            reason: reason.into(),
        }
    }
}
