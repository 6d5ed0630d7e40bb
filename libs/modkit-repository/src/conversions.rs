//! Custom conversions: simple-type allow-list plus value converters.
//!
//! The registry built for a stack merges three sources:
//! - the simple types declared by the dialect (or the built-in default set)
//! - the converters declared by the dialect
//! - the built-in store converters
//!
//! User converters, when present, take precedence over store converters.

use std::collections::BTreeSet;
use std::fmt;

use crate::dialect::Dialect;
use crate::value::{SqlValue, ValueType};

/// Types every dialect can bind without conversion.
pub const DEFAULT_SIMPLE_TYPES: &[ValueType] = &[
    ValueType::Bool,
    ValueType::Integer,
    ValueType::Double,
    ValueType::Text,
    ValueType::Bytes,
    ValueType::Date,
    ValueType::Timestamp,
];

/// Direction a converter applies in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionDirection {
    /// Database value → mapped value.
    Reading,
    /// Mapped value → database value.
    Writing,
}

type ConvertFn = fn(&SqlValue) -> Option<SqlValue>;

/// A single value converter between two logical types.
#[derive(Clone, Copy)]
pub struct Converter {
    pub name: &'static str,
    pub source: ValueType,
    pub target: ValueType,
    pub direction: ConversionDirection,
    convert: ConvertFn,
}

impl Converter {
    #[must_use]
    pub const fn reading(
        name: &'static str,
        source: ValueType,
        target: ValueType,
        convert: ConvertFn,
    ) -> Self {
        Self {
            name,
            source,
            target,
            direction: ConversionDirection::Reading,
            convert,
        }
    }

    #[must_use]
    pub const fn writing(
        name: &'static str,
        source: ValueType,
        target: ValueType,
        convert: ConvertFn,
    ) -> Self {
        Self {
            name,
            source,
            target,
            direction: ConversionDirection::Writing,
            convert,
        }
    }

    /// Apply the converter; `None` when the value does not have the source type.
    #[must_use]
    pub fn convert(&self, value: &SqlValue) -> Option<SqlValue> {
        (self.convert)(value)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Converter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.source == other.source
            && self.target == other.target
            && self.direction == other.direction
    }
}

// ---- built-in converters ----

fn date_to_timestamp(value: &SqlValue) -> Option<SqlValue> {
    match value {
        SqlValue::Date(d) => d.and_hms_opt(0, 0, 0).map(SqlValue::Timestamp),
        _ => None,
    }
}

fn timestamp_to_date(value: &SqlValue) -> Option<SqlValue> {
    match value {
        SqlValue::Timestamp(ts) => Some(SqlValue::Date(ts.date())),
        _ => None,
    }
}

fn uuid_to_text(value: &SqlValue) -> Option<SqlValue> {
    match value {
        SqlValue::Uuid(u) => Some(SqlValue::Text(u.hyphenated().to_string())),
        _ => None,
    }
}

fn text_to_uuid(value: &SqlValue) -> Option<SqlValue> {
    match value {
        SqlValue::Text(s) => uuid::Uuid::parse_str(s).ok().map(SqlValue::Uuid),
        _ => None,
    }
}

fn bool_to_integer(value: &SqlValue) -> Option<SqlValue> {
    match value {
        SqlValue::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        _ => None,
    }
}

fn integer_to_bool(value: &SqlValue) -> Option<SqlValue> {
    match value {
        SqlValue::Integer(i) => Some(SqlValue::Bool(*i != 0)),
        _ => None,
    }
}

fn json_to_text(value: &SqlValue) -> Option<SqlValue> {
    match value {
        SqlValue::Json(j) => Some(SqlValue::Text(j.to_string())),
        _ => None,
    }
}

fn text_to_json(value: &SqlValue) -> Option<SqlValue> {
    match value {
        SqlValue::Text(s) => serde_json::from_str(s).ok().map(SqlValue::Json),
        _ => None,
    }
}

pub const DATE_TO_TIMESTAMP: Converter = Converter::writing(
    "date-to-timestamp",
    ValueType::Date,
    ValueType::Timestamp,
    date_to_timestamp,
);

pub const TIMESTAMP_TO_DATE: Converter = Converter::reading(
    "timestamp-to-date",
    ValueType::Timestamp,
    ValueType::Date,
    timestamp_to_date,
);

pub const UUID_TO_TEXT: Converter =
    Converter::writing("uuid-to-text", ValueType::Uuid, ValueType::Text, uuid_to_text);

pub const TEXT_TO_UUID: Converter =
    Converter::reading("text-to-uuid", ValueType::Text, ValueType::Uuid, text_to_uuid);

pub const BOOL_TO_INTEGER: Converter = Converter::writing(
    "bool-to-integer",
    ValueType::Bool,
    ValueType::Integer,
    bool_to_integer,
);

pub const INTEGER_TO_BOOL: Converter = Converter::reading(
    "integer-to-bool",
    ValueType::Integer,
    ValueType::Bool,
    integer_to_bool,
);

pub const JSON_TO_TEXT: Converter =
    Converter::writing("json-to-text", ValueType::Json, ValueType::Text, json_to_text);

pub const TEXT_TO_JSON: Converter =
    Converter::reading("text-to-json", ValueType::Text, ValueType::Json, text_to_json);

/// Converters every store gets regardless of dialect.
///
/// Only the reading side of JSON lives here: drivers may return JSON columns
/// as text even where JSON binds natively. Dialects without a JSON type
/// declare `JSON_TO_TEXT` themselves.
pub const STORE_CONVERTERS: &[Converter] = &[DATE_TO_TIMESTAMP, TIMESTAMP_TO_DATE, TEXT_TO_JSON];

/// Set of types that bind without conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleTypeHolder {
    types: BTreeSet<ValueType>,
}

impl SimpleTypeHolder {
    /// The built-in default set.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            types: DEFAULT_SIMPLE_TYPES.iter().copied().collect(),
        }
    }

    /// `custom` types on top of everything in `parent`.
    #[must_use]
    pub fn with_parent(custom: &[ValueType], parent: &SimpleTypeHolder) -> Self {
        let mut types = parent.types.clone();
        types.extend(custom.iter().copied());
        Self { types }
    }

    /// Exactly the given types, without the built-in defaults.
    #[must_use]
    pub fn of(types: &[ValueType]) -> Self {
        Self {
            types: types.iter().copied().collect(),
        }
    }

    #[must_use]
    pub fn is_simple(&self, value_type: ValueType) -> bool {
        self.types.contains(&value_type)
    }

    pub fn types(&self) -> impl Iterator<Item = ValueType> + '_ {
        self.types.iter().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for SimpleTypeHolder {
    fn default() -> Self {
        Self::defaults()
    }
}

/// The merged conversion bundle a type converter works with.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionRegistry {
    simple_types: SimpleTypeHolder,
    store_converters: Vec<Converter>,
    user_converters: Vec<Converter>,
}

impl ConversionRegistry {
    #[must_use]
    pub fn new(
        simple_types: SimpleTypeHolder,
        store_converters: Vec<Converter>,
        user_converters: Vec<Converter>,
    ) -> Self {
        Self {
            simple_types,
            store_converters,
            user_converters,
        }
    }

    /// Build the default registry for a dialect.
    ///
    /// A dialect without declared simple types gets the built-in default set;
    /// otherwise its types are added on top of the defaults. Dialect
    /// converters come before the built-in store converters.
    #[must_use]
    pub fn for_dialect(dialect: &dyn Dialect) -> Self {
        let defaults = SimpleTypeHolder::defaults();
        let simple_types = if dialect.simple_types().is_empty() {
            defaults
        } else {
            SimpleTypeHolder::with_parent(dialect.simple_types(), &defaults)
        };

        let mut store_converters = dialect.converters();
        store_converters.extend_from_slice(STORE_CONVERTERS);

        Self::new(simple_types, store_converters, Vec::new())
    }

    #[must_use]
    pub fn with_user_converters(mut self, converters: Vec<Converter>) -> Self {
        self.user_converters = converters;
        self
    }

    #[must_use]
    pub fn simple_types(&self) -> &SimpleTypeHolder {
        &self.simple_types
    }

    #[must_use]
    pub fn is_simple_type(&self, value_type: ValueType) -> bool {
        self.simple_types.is_simple(value_type)
    }

    /// User converters first, then store converters.
    pub fn converters(&self) -> impl Iterator<Item = &Converter> {
        self.user_converters.iter().chain(self.store_converters.iter())
    }

    /// First writing converter for values of `source`.
    #[must_use]
    pub fn writing_converter(&self, source: ValueType) -> Option<&Converter> {
        self.converters()
            .find(|c| c.direction == ConversionDirection::Writing && c.source == source)
    }

    /// Reading converter from the stored `source` type to the mapped `target` type.
    #[must_use]
    pub fn reading_converter(&self, source: ValueType, target: ValueType) -> Option<&Converter> {
        self.converters().find(|c| {
            c.direction == ConversionDirection::Reading && c.source == source && c.target == target
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::dialect::{DialectKind, IdentifierProcessing};

    #[derive(Debug)]
    struct Bare;

    impl Dialect for Bare {
        fn name(&self) -> &str {
            "bare"
        }

        fn identifier_processing(&self) -> IdentifierProcessing {
            IdentifierProcessing::NONE
        }
    }

    #[test]
    fn empty_dialect_simple_types_fall_back_to_defaults() {
        let registry = ConversionRegistry::for_dialect(&Bare);

        assert_eq!(registry.simple_types(), &SimpleTypeHolder::defaults());
        assert!(!registry.simple_types().is_empty());
        assert!(registry.is_simple_type(ValueType::Text));
        assert!(!registry.is_simple_type(ValueType::Uuid));
    }

    #[test]
    fn dialect_simple_types_extend_defaults() {
        let registry = ConversionRegistry::for_dialect(DialectKind::Postgres.dialect().as_ref());

        assert!(registry.is_simple_type(ValueType::Uuid));
        assert!(registry.is_simple_type(ValueType::Json));
        assert!(registry.is_simple_type(ValueType::Integer));
    }

    #[test]
    fn dialect_converters_precede_store_converters() {
        let registry = ConversionRegistry::for_dialect(DialectKind::Sqlite.dialect().as_ref());
        let names: Vec<_> = registry.converters().map(|c| c.name).collect();

        assert_eq!(names.first(), Some(&"bool-to-integer"));
        assert!(names.contains(&"date-to-timestamp"));
        assert_eq!(names.len(), 5 + STORE_CONVERTERS.len());
    }

    #[test]
    fn user_converters_win_over_store_converters() {
        fn date_to_text(value: &SqlValue) -> Option<SqlValue> {
            match value {
                SqlValue::Date(d) => Some(SqlValue::Text(d.to_string())),
                _ => None,
            }
        }
        let date_to_text =
            Converter::writing("date-to-text", ValueType::Date, ValueType::Text, date_to_text);

        let registry = ConversionRegistry::for_dialect(&Bare).with_user_converters(vec![date_to_text]);

        let chosen = registry.writing_converter(ValueType::Date).unwrap();
        assert_eq!(chosen.name, "date-to-text");
    }

    #[test]
    fn builtin_converters_transform_values() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let ts = DATE_TO_TIMESTAMP.convert(&SqlValue::Date(date)).unwrap();
        assert_eq!(TIMESTAMP_TO_DATE.convert(&ts), Some(SqlValue::Date(date)));

        assert_eq!(BOOL_TO_INTEGER.convert(&SqlValue::Bool(true)), Some(SqlValue::Integer(1)));
        assert_eq!(BOOL_TO_INTEGER.convert(&SqlValue::Integer(1)), None);
    }

    #[test]
    fn json_binds_natively_only_where_declared() {
        let postgres = ConversionRegistry::for_dialect(DialectKind::Postgres.dialect().as_ref());
        assert!(postgres.writing_converter(ValueType::Json).is_none());
        assert!(postgres.reading_converter(ValueType::Text, ValueType::Json).is_some());

        for kind in [DialectKind::MySql, DialectKind::Sqlite] {
            let registry = ConversionRegistry::for_dialect(kind.dialect().as_ref());
            assert_eq!(
                registry.writing_converter(ValueType::Json).map(|c| c.name),
                Some("json-to-text")
            );
            assert!(registry.reading_converter(ValueType::Text, ValueType::Json).is_some());
        }

        let doc = serde_json::json!({"a": 1});
        let stored = JSON_TO_TEXT.convert(&SqlValue::Json(doc.clone())).unwrap();
        assert_eq!(TEXT_TO_JSON.convert(&stored), Some(SqlValue::Json(doc)));
        assert_eq!(TEXT_TO_JSON.convert(&SqlValue::Text("{".to_owned())), None);
    }
}
