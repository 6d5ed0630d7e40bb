use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::{ArrayColumns, Dialect, IdGeneration, IdentifierProcessing, LetterCasing, Quoting};
use crate::conversions::{self, Converter};
use crate::value::ValueType;
use crate::{RepositoryError, Result};

/// Built-in dialects, addressable by name from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Postgres,
    MySql,
    Sqlite,
}

impl DialectKind {
    /// Detect the dialect from a DSN scheme.
    ///
    /// Only scheme prefixes are inspected; credentials and the rest of the
    /// DSN are left alone.
    ///
    /// # Errors
    /// Returns `RepositoryError::UnsupportedDialect` if the scheme is not recognized.
    pub fn from_dsn(dsn: &str) -> Result<Self> {
        // Trim only leading whitespace to be forgiving with env files.
        let s = dsn.trim_start();

        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            Ok(DialectKind::Postgres)
        } else if s.starts_with("mysql://") || s.starts_with("mariadb://") {
            Ok(DialectKind::MySql)
        } else if s.starts_with("sqlite:") {
            Ok(DialectKind::Sqlite)
        } else {
            Err(RepositoryError::UnsupportedDialect {
                product: s.split(':').next().unwrap_or_default().to_owned(),
            })
        }
    }

    /// Match the product name reported by database metadata.
    #[must_use]
    pub fn from_product_name(product: &str) -> Option<Self> {
        let product = product.to_ascii_lowercase();
        if product.contains("postgres") {
            Some(DialectKind::Postgres)
        } else if product.contains("mysql") || product.contains("mariadb") {
            Some(DialectKind::MySql)
        } else if product.contains("sqlite") {
            Some(DialectKind::Sqlite)
        } else {
            None
        }
    }

    #[must_use]
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            DialectKind::Postgres => Arc::new(PostgresDialect),
            DialectKind::MySql => Arc::new(MySqlDialect),
            DialectKind::Sqlite => Arc::new(SqliteDialect),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DialectKind::Postgres => "postgres",
            DialectKind::MySql => "mysql",
            DialectKind::Sqlite => "sqlite",
        })
    }
}

const POSTGRES_SIMPLE_TYPES: &[ValueType] = &[ValueType::Uuid, ValueType::Json];

#[derive(Clone, Copy, Debug, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn identifier_processing(&self) -> IdentifierProcessing {
        IdentifierProcessing {
            quoting: Quoting::Ansi,
            casing: LetterCasing::Lower,
        }
    }

    fn simple_types(&self) -> &[ValueType] {
        POSTGRES_SIMPLE_TYPES
    }

    fn array_support(&self) -> Option<Arc<dyn ArrayColumns>> {
        Some(Arc::new(PostgresArrayColumns))
    }

    fn id_generation(&self) -> IdGeneration {
        IdGeneration {
            supports_generated_keys: true,
            driver_requires_key_column_names: true,
        }
    }
}

/// Native `PostgreSQL` array types.
#[derive(Clone, Copy, Debug, Default)]
pub struct PostgresArrayColumns;

impl ArrayColumns for PostgresArrayColumns {
    fn is_supported(&self) -> bool {
        true
    }

    fn array_type_name(&self, element: ValueType) -> String {
        match element {
            ValueType::Bool => "bool",
            ValueType::Integer => "int8",
            ValueType::Double => "float8",
            ValueType::Text => "text",
            ValueType::Bytes => "bytea",
            ValueType::Uuid => "uuid",
            ValueType::Date => "date",
            ValueType::Timestamp => "timestamp",
            ValueType::Json => "jsonb",
        }
        .to_owned()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn identifier_processing(&self) -> IdentifierProcessing {
        IdentifierProcessing {
            quoting: Quoting::Backtick,
            casing: LetterCasing::Lower,
        }
    }

    fn converters(&self) -> Vec<Converter> {
        vec![
            conversions::UUID_TO_TEXT,
            conversions::TEXT_TO_UUID,
            conversions::JSON_TO_TEXT,
        ]
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn identifier_processing(&self) -> IdentifierProcessing {
        IdentifierProcessing {
            quoting: Quoting::Ansi,
            casing: LetterCasing::AsIs,
        }
    }

    fn converters(&self) -> Vec<Converter> {
        vec![
            conversions::BOOL_TO_INTEGER,
            conversions::INTEGER_TO_BOOL,
            conversions::UUID_TO_TEXT,
            conversions::TEXT_TO_UUID,
            conversions::JSON_TO_TEXT,
        ]
    }
}
