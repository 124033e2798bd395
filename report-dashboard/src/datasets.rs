use std::collections::HashMap;

use report_core::{DataTable, Field, Table};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub id: String,
    pub rows: usize,
    pub fields: Vec<Field>,
    /// Numeric fields, the ones a report can target.
    pub report_fields: Vec<String>,
    /// Rows visible through the current filter, when one is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_rows: Option<usize>,
}

/// In-memory datasets keyed by id.
#[derive(Default)]
pub struct DatasetStore {
    tables: HashMap<String, DataTable>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and stores a table, replacing any dataset with the same id.
    pub fn insert(&mut self, id: &str, records: &[Map<String, Value>]) -> DatasetSummary {
        let table = DataTable::from_records(id, records);
        let summary = summarize(&table);
        let replaced = self.tables.insert(id.to_owned(), table).is_some();
        info!(dataset = id, rows = summary.rows, replaced, "Dataset stored");
        summary
    }

    pub fn get(&self, id: &str) -> Option<&DataTable> {
        self.tables.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DataTable> {
        self.tables.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.tables.remove(id).is_some()
    }

    /// Summaries sorted by id.
    pub fn summaries(&self) -> Vec<DatasetSummary> {
        let mut summaries: Vec<DatasetSummary> = self
            .tables
            .values()
            .map(|t| summarize(t))
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }
}

pub fn summarize(table: &DataTable) -> DatasetSummary {
    DatasetSummary {
        id: table.id.clone(),
        rows: table.len(),
        fields: table.fields().to_vec(),
        report_fields: table
            .numeric_fields()
            .into_iter()
            .map(|f| f.name.clone())
            .collect(),
        filtered_rows: table.is_filtered().then(|| table.rows().len()),
    }
}
