//! Column values and rows exchanged with the operations handle.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Logical column types known to the conversion layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Integer,
    Double,
    Text,
    Bytes,
    Uuid,
    Date,
    Timestamp,
    Json,
}

impl ValueType {
    /// Generic SQL type name, used when the dialect has no better spelling.
    #[must_use]
    pub fn sql_name(self) -> &'static str {
        match self {
            ValueType::Bool => "BOOLEAN",
            ValueType::Integer => "BIGINT",
            ValueType::Double => "DOUBLE PRECISION",
            ValueType::Text => "VARCHAR",
            ValueType::Bytes => "VARBINARY",
            ValueType::Uuid => "UUID",
            ValueType::Date => "DATE",
            ValueType::Timestamp => "TIMESTAMP",
            ValueType::Json => "JSON",
        }
    }
}

/// A single column value.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
    Array(Vec<SqlValue>),
}

impl SqlValue {
    /// Logical type of the value; `None` for `Null` and arrays.
    #[must_use]
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            SqlValue::Null | SqlValue::Array(_) => None,
            SqlValue::Bool(_) => Some(ValueType::Bool),
            SqlValue::Integer(_) => Some(ValueType::Integer),
            SqlValue::Double(_) => Some(ValueType::Double),
            SqlValue::Text(_) => Some(ValueType::Text),
            SqlValue::Bytes(_) => Some(ValueType::Bytes),
            SqlValue::Uuid(_) => Some(ValueType::Uuid),
            SqlValue::Date(_) => Some(ValueType::Date),
            SqlValue::Timestamp(_) => Some(ValueType::Timestamp),
            SqlValue::Json(_) => Some(ValueType::Json),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// One result row, keyed by column name.
pub type Row = BTreeMap<String, SqlValue>;

/// A loaded aggregate: the root row plus one level of related rows keyed by
/// relation property name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityRecord {
    pub values: Row,
    pub relations: BTreeMap<String, Vec<Row>>,
}

impl EntityRecord {
    #[must_use]
    pub fn new(values: Row) -> Self {
        Self {
            values,
            relations: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }
}
