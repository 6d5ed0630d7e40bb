//! SQL dialects: identifier handling, simple types, converters, array support.

mod builtin;
mod resolver;

pub use builtin::{DialectKind, MySqlDialect, PostgresArrayColumns, PostgresDialect, SqliteDialect};
pub use resolver::{DefaultDialectResolver, DialectResolver};

use std::fmt;
use std::sync::Arc;

use crate::conversions::Converter;
use crate::value::ValueType;

/// Capabilities of one SQL dialect.
///
/// Only `name` and `identifier_processing` are mandatory; the remaining
/// capabilities default to "nothing declared" and the stack falls back to
/// its built-in defaults for them.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn identifier_processing(&self) -> IdentifierProcessing;

    /// Types the dialect can bind directly in addition to the built-in set.
    fn simple_types(&self) -> &[ValueType] {
        &[]
    }

    fn converters(&self) -> Vec<Converter> {
        Vec::new()
    }

    /// Native array column support; `None` selects [`DefaultArraySupport`].
    fn array_support(&self) -> Option<Arc<dyn ArrayColumns>> {
        None
    }

    fn id_generation(&self) -> IdGeneration {
        IdGeneration::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quoting {
    /// `"identifier"`
    Ansi,
    /// `` `identifier` ``
    Backtick,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LetterCasing {
    AsIs,
    Lower,
    Upper,
}

/// How the dialect spells table and column names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentifierProcessing {
    pub quoting: Quoting,
    pub casing: LetterCasing,
}

impl IdentifierProcessing {
    pub const ANSI: Self = Self {
        quoting: Quoting::Ansi,
        casing: LetterCasing::Upper,
    };

    pub const NONE: Self = Self {
        quoting: Quoting::None,
        casing: LetterCasing::AsIs,
    };

    #[must_use]
    pub fn standardize(&self, identifier: &str) -> String {
        match self.casing {
            LetterCasing::AsIs => identifier.to_owned(),
            LetterCasing::Lower => identifier.to_lowercase(),
            LetterCasing::Upper => identifier.to_uppercase(),
        }
    }

    #[must_use]
    pub fn quote(&self, identifier: &str) -> String {
        match self.quoting {
            Quoting::Ansi => format!("\"{}\"", identifier.replace('"', "\"\"")),
            Quoting::Backtick => format!("`{}`", identifier.replace('`', "``")),
            Quoting::None => identifier.to_owned(),
        }
    }

    /// Standardize the letter case, then quote.
    #[must_use]
    pub fn process(&self, identifier: &str) -> String {
        self.quote(&self.standardize(identifier))
    }
}

/// Key generation behavior of the dialect's driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdGeneration {
    pub supports_generated_keys: bool,
    /// Some drivers only return generated keys when the key columns are named.
    pub driver_requires_key_column_names: bool,
}

impl Default for IdGeneration {
    fn default() -> Self {
        Self {
            supports_generated_keys: true,
            driver_requires_key_column_names: false,
        }
    }
}

/// Array column support.
pub trait ArrayColumns: Send + Sync + fmt::Debug {
    fn is_supported(&self) -> bool;

    /// SQL type name used to create an array of `element` values.
    fn array_type_name(&self, element: ValueType) -> String;
}

/// Generic array support used when the dialect declares none: arrays are
/// accepted and named after the generic SQL type of their elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultArraySupport;

impl ArrayColumns for DefaultArraySupport {
    fn is_supported(&self) -> bool {
        true
    }

    fn array_type_name(&self, element: ValueType) -> String {
        element.sql_name().to_owned()
    }
}
