use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::accessor::{Accessor, FieldValue, Table, parse_timestamp};

/// Column type, inferred from the first non-null value seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    Real,
    String,
    Timestamp,
    Boolean,
}

impl FieldKind {
    fn infer(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(FieldKind::Integer),
            Value::Number(_) => Some(FieldKind::Real),
            Value::Bool(_) => Some(FieldKind::Boolean),
            Value::String(s) if s.parse::<f64>().is_err() && parse_timestamp(s).is_some() => {
                Some(FieldKind::Timestamp)
            }
            _ => Some(FieldKind::String),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Real)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

/// Array-like row; cell `i` belongs to field `i`.
pub type Row = Vec<Value>;

/// In-memory dataset with an optional filter view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTable {
    pub id: String,
    fields: Vec<Field>,
    rows: Vec<Row>,
    #[serde(default)]
    filtered_index: Option<Vec<usize>>,
}

impl DataTable {
    pub fn new(id: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            id: id.into(),
            fields,
            rows: Vec::new(),
            filtered_index: None,
        }
    }

    /// Builds a table from JSON objects. Fields are discovered in first-seen
    /// order; objects missing a field get `null` in that cell.
    pub fn from_records(id: impl Into<String>, records: &[Map<String, Value>]) -> Self {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let fields = names
            .iter()
            .map(|name| {
                let kind = records
                    .iter()
                    .filter_map(|r| r.get(name))
                    .find_map(FieldKind::infer)
                    .unwrap_or(FieldKind::String);
                Field {
                    name: name.clone(),
                    kind,
                }
            })
            .collect();

        let mut table = DataTable::new(id, fields);
        for record in records {
            let row = names
                .iter()
                .map(|name| record.get(name).cloned().unwrap_or(Value::Null))
                .collect();
            table.push_row(row);
        }
        table
    }

    /// Appends a row, padding with `null` or truncating to the field count.
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.fields.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Fields a report can target.
    pub fn numeric_fields(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.kind.is_numeric()).collect()
    }

    /// Number of rows, ignoring the filter.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Restricts [`Table::rows`] to the given indices. Out-of-range indices
    /// are dropped.
    pub fn set_filter(&mut self, indices: Vec<usize>) {
        let len = self.rows.len();
        self.filtered_index = Some(indices.into_iter().filter(|&i| i < len).collect());
    }

    pub fn clear_filter(&mut self) {
        self.filtered_index = None;
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered_index.is_some()
    }
}

impl Table for DataTable {
    type Row = Row;

    fn rows(&self) -> Vec<&Row> {
        match &self.filtered_index {
            Some(indices) => indices.iter().filter_map(|&i| self.rows.get(i)).collect(),
            None => self.rows.iter().collect(),
        }
    }

    fn column(&self, name: &str) -> Option<Accessor<'_, Row>> {
        let idx = self.field_index(name)?;
        Some(Box::new(move |row: &Row| {
            row.get(idx).and_then(FieldValue::from_json)
        }))
    }
}
