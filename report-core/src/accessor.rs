//! Column access over opaque dataset rows.
//!
//! The core never looks inside a row. A [`Table`] resolves a logical column
//! name to an [`Accessor`] once, and the accessor is then applied per row.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DATE_COLUMN: &str = "date";
pub const MINION_COLUMN: &str = "minion_id";
pub const ENODEB_COLUMN: &str = "enodeb_id";
pub const CELL_NAME_COLUMN: &str = "cell_name";

/// Formats accepted for string timestamps besides RFC 3339. Interpreted as UTC.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A primitive cell value. Absent values are `None` at the accessor level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => n.as_f64().map(FieldValue::Number),
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Some(FieldValue::Text(value.to_string())),
        }
    }

    /// Numeric view of the value. Numeric strings are parsed; non-finite
    /// numbers count as missing.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n).filter(|n| n.is_finite()),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            FieldValue::Bool(_) => None,
        }
    }

    /// Epoch milliseconds. Numbers are taken as milliseconds already.
    pub fn as_timestamp_ms(&self) -> Option<i64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n as i64),
            FieldValue::Number(_) => None,
            FieldValue::Text(s) => parse_timestamp(s),
            FieldValue::Bool(_) => None,
        }
    }

    /// Grouping key. Integral numbers render without a fractional part so that
    /// `7` and `7.0` land in the same group.
    pub fn as_key(&self) -> String {
        match self {
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

pub fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    s.parse::<i64>().ok()
}

/// Extracts one column's value from a row.
pub type Accessor<'a, R> = Box<dyn Fn(&R) -> Option<FieldValue> + 'a>;

/// The dataset collaborator: a row source plus column resolution.
pub trait Table {
    type Row;

    /// Rows visible under the current filter, in dataset order.
    fn rows(&self) -> Vec<&Self::Row>;

    /// Resolves a logical column name. `None` means the dataset has no such
    /// column, which callers treat as "cannot produce a report".
    fn column(&self, name: &str) -> Option<Accessor<'_, Self::Row>>;
}

pub fn number_at<R>(accessor: &Accessor<'_, R>, row: &R) -> Option<f64> {
    accessor(row)?.as_number()
}

pub fn timestamp_at<R>(accessor: &Accessor<'_, R>, row: &R) -> Option<i64> {
    accessor(row)?.as_timestamp_ms()
}

pub fn key_at<R>(accessor: &Accessor<'_, R>, row: &R) -> Option<String> {
    accessor(row).map(|v| v.as_key())
}
