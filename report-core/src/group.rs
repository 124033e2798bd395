use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accessor::{Accessor, key_at, number_at, timestamp_at};

/// One timestamped observation. `value` is `None` when the row had no usable
/// number; such samples still occupy a time slot but never feed a reducer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub ts: i64,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityGroup {
    pub key: String,
    /// Display name carried alongside the key (e.g. a cell name).
    pub label: Option<String>,
    /// Sorted ascending by timestamp; ties keep row order.
    pub samples: Vec<Sample>,
}

impl EntityGroup {
    /// Present values, in timestamp order.
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().filter_map(|s| s.value).collect()
    }

    /// Number of rows in the group, including those without a value.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOrder {
    /// Ascending by key (string order).
    Ascending,
    /// Order in which each key was first seen.
    FirstSeen,
}

/// Partitions rows by entity key.
///
/// Rows without a key or a timestamp cannot be placed and are dropped. When a
/// `label` accessor is given, the last label seen for a key wins.
pub fn group_by_entity<'r, R: 'r>(
    rows: impl IntoIterator<Item = &'r R>,
    entity: &Accessor<'_, R>,
    value: &Accessor<'_, R>,
    time: &Accessor<'_, R>,
    label: Option<&Accessor<'_, R>>,
    order: GroupOrder,
) -> Vec<EntityGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<EntityGroup> = Vec::new();
    let mut dropped = 0usize;

    for row in rows {
        let (Some(key), Some(ts)) = (key_at(entity, row), timestamp_at(time, row)) else {
            dropped += 1;
            continue;
        };
        let slot = *index.entry(key).or_insert_with_key(|key| {
            groups.push(EntityGroup {
                key: key.clone(),
                label: None,
                samples: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        if let Some(name) = label.and_then(|l| key_at(l, row)) {
            group.label = Some(name);
        }
        group.samples.push(Sample {
            ts,
            value: number_at(value, row),
        });
    }

    for group in &mut groups {
        group.samples.sort_by_key(|s| s.ts);
    }
    if order == GroupOrder::Ascending {
        groups.sort_by(|a, b| a.key.cmp(&b.key));
    }

    debug!(groups = groups.len(), dropped, "grouped rows by entity");
    groups
}

/// Earliest and latest timestamp across all groups.
pub fn time_extent(groups: &[EntityGroup]) -> Option<(i64, i64)> {
    groups
        .iter()
        .flat_map(|g| g.samples.iter().map(|s| s.ts))
        .fold(None, |acc, ts| match acc {
            None => Some((ts, ts)),
            Some((lo, hi)) => Some((lo.min(ts), hi.max(ts))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::FieldValue;

    struct Row {
        entity: Option<&'static str>,
        ts: Option<i64>,
        value: Option<f64>,
        name: &'static str,
    }

    fn row(entity: &'static str, ts: i64, value: f64) -> Row {
        Row {
            entity: Some(entity),
            ts: Some(ts),
            value: Some(value),
            name: "",
        }
    }

    fn group(rows: &[Row], order: GroupOrder) -> Vec<EntityGroup> {
        let entity: Accessor<'_, Row> =
            Box::new(|r: &Row| r.entity.map(|e| FieldValue::Text(e.to_string())));
        let value: Accessor<'_, Row> = Box::new(|r: &Row| r.value.map(FieldValue::Number));
        let time: Accessor<'_, Row> = Box::new(|r: &Row| r.ts.map(|t| FieldValue::Number(t as f64)));
        let label: Accessor<'_, Row> = Box::new(|r: &Row| {
            (!r.name.is_empty()).then(|| FieldValue::Text(r.name.to_string()))
        });
        group_by_entity(rows, &entity, &value, &time, Some(&label), order)
    }

    #[test]
    fn test_ascending_and_first_seen_orders() {
        let rows = [row("b", 0, 1.0), row("a", 0, 2.0), row("c", 0, 3.0)];
        let keys = |groups: Vec<EntityGroup>| -> Vec<String> {
            groups.into_iter().map(|g| g.key).collect()
        };
        assert_eq!(keys(group(&rows, GroupOrder::Ascending)), vec!["a", "b", "c"]);
        assert_eq!(keys(group(&rows, GroupOrder::FirstSeen)), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_samples_sorted_stably() {
        let rows = [
            row("a", 300, 1.0),
            row("a", 100, 2.0),
            row("a", 300, 3.0),
            row("a", 200, 4.0),
        ];
        let groups = group(&rows, GroupOrder::FirstSeen);
        let pairs: Vec<(i64, Option<f64>)> =
            groups[0].samples.iter().map(|s| (s.ts, s.value)).collect();
        assert_eq!(
            pairs,
            vec![
                (100, Some(2.0)),
                (200, Some(4.0)),
                (300, Some(1.0)),
                (300, Some(3.0))
            ]
        );
    }

    #[test]
    fn test_unplaceable_rows_dropped_null_values_kept() {
        let rows = [
            row("a", 0, 1.0),
            Row {
                entity: None,
                ts: Some(5),
                value: Some(9.0),
                name: "",
            },
            Row {
                entity: Some("a"),
                ts: None,
                value: Some(9.0),
                name: "",
            },
            Row {
                entity: Some("a"),
                ts: Some(10),
                value: None,
                name: "",
            },
        ];
        let groups = group(&rows, GroupOrder::FirstSeen);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].values(), vec![1.0]);
    }

    #[test]
    fn test_last_label_wins() {
        let mut first = row("7", 0, 1.0);
        first.name = "old";
        let mut second = row("7", 1, 1.0);
        second.name = "new";
        let groups = group(&[first, second, row("7", 2, 1.0)], GroupOrder::FirstSeen);
        assert_eq!(groups[0].label.as_deref(), Some("new"));
    }

    #[test]
    fn test_time_extent() {
        let rows = [row("a", 40, 1.0), row("b", -5, 1.0), row("a", 10, 1.0)];
        assert_eq!(time_extent(&group(&rows, GroupOrder::FirstSeen)), Some((-5, 40)));
        assert_eq!(time_extent(&[]), None);
    }
}
