//! The data report: one series per minion over a fixed sampling ladder.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accessor::{DATE_COLUMN, MINION_COLUMN, Table};
use crate::aggregate::{AggregationKind, aggregate, round2};
use crate::bucket::sampling_dates;
use crate::compose::{
    ComposeOptions, Composition, Domain, GroupSeries, RenderMode, SeriesValues, Summary,
    compose_series,
};
use crate::error::{Error, Result};
use crate::group::{GroupOrder, Sample, group_by_entity, time_extent};

/// Interval choices offered by the report, in seconds, with their labels.
pub const REPORT_INTERVAL_OPTIONS: &[(u32, &str)] = &[
    (5, "5s"),
    (10, "10s"),
    (15, "15s"),
    (30, "30s"),
    (60, "1min"),
    (120, "2min"),
    (300, "5min"),
];

/// Aggregations offered by the report. `None` plots raw samples.
pub const REPORT_AGGREGATION_OPTIONS: &[(Option<AggregationKind>, &str)] = &[
    (None, "none"),
    (Some(AggregationKind::Sum), "sum"),
    (Some(AggregationKind::Average), "average"),
    (Some(AggregationKind::Minimum), "min"),
    (Some(AggregationKind::Maximum), "max"),
];

pub const DEFAULT_INTERVAL_SECS: u32 = 10;

pub type ReportType = RenderMode;

/// Selection state for one report invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub data_id: Option<String>,
    pub field: Option<String>,
    pub aggregation: Option<AggregationKind>,
    pub interval_secs: u32,
    pub report_type: ReportType,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            data_id: None,
            field: None,
            aggregation: Some(AggregationKind::Average),
            interval_secs: DEFAULT_INTERVAL_SECS,
            report_type: RenderMode::Independent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataReport {
    #[serde(flatten)]
    pub chart: Composition,
    /// Shared x axis of every bucketed series. Absent in raw mode, where each
    /// series carries its own timestamps.
    pub sampling_dates: Option<Vec<i64>>,
}

/// Builds the report for `table`.
///
/// Returns `Ok(None)` when no field is selected, when the dataset lacks the
/// `date`, `minion_id` or target column, or when no row can be placed.
pub fn generate_data_report<T: Table>(table: &T, config: &ReportConfig) -> Result<Option<DataReport>> {
    if let Some(kind) = config.aggregation.filter(|k| !k.is_numeric()) {
        return Err(Error::UnsupportedAggregation(kind));
    }
    let interval_ms = i64::from(config.interval_secs) * 1000;
    if interval_ms <= 0 {
        return Err(Error::InvalidInterval(interval_ms));
    }

    let Some(field) = config.field.as_deref() else {
        return Ok(None);
    };
    let (Some(date), Some(minion), Some(value)) = (
        table.column(DATE_COLUMN),
        table.column(MINION_COLUMN),
        table.column(field),
    ) else {
        debug!(field, "report columns unavailable");
        return Ok(None);
    };

    let rows = table.rows();
    let groups = group_by_entity(
        rows.iter().copied(),
        &minion,
        &value,
        &date,
        None,
        GroupOrder::Ascending,
    );
    let Some((start, end)) = time_extent(&groups) else {
        return Ok(None);
    };

    let dates = match config.aggregation {
        Some(_) => Some(sampling_dates(start, end, interval_ms)?),
        None => None,
    };
    debug!(
        field,
        groups = groups.len(),
        buckets = dates.as_ref().map_or(0, Vec::len),
        "building data report"
    );

    let raw_extent = Domain::of(groups.iter().flat_map(|g| g.values()));
    let mut composed = Vec::with_capacity(groups.len());
    for group in &groups {
        let values = match (config.aggregation, &dates) {
            (Some(kind), Some(dates)) => {
                SeriesValues::Bucketed(sweep(&group.samples, dates, interval_ms, kind)?)
            }
            _ => SeriesValues::Raw(group.samples.iter().map(|s| (s.ts, s.value)).collect()),
        };
        composed.push(GroupSeries {
            key: group.key.clone(),
            label: None,
            values,
            summary: Summary::of(&group.values(), group.len()),
        });
    }

    let options = ComposeOptions {
        aggregation: config.aggregation,
        mode: config.report_type,
        reverse: true,
    };
    Ok(Some(DataReport {
        chart: compose_series(composed, &options, raw_extent),
        sampling_dates: dates,
    }))
}

/// Walks the sorted samples once. Every sample at or before `date + interval`
/// that was not consumed by an earlier date feeds that date's slot; empty
/// slots are 0.
fn sweep(
    samples: &[Sample],
    dates: &[i64],
    interval_ms: i64,
    kind: AggregationKind,
) -> Result<Vec<Option<f64>>> {
    let mut cursor = 0;
    let mut span = Vec::new();
    let mut out = Vec::with_capacity(dates.len());

    for &date in dates {
        span.clear();
        let window_end = date.saturating_add(interval_ms);
        while let Some(sample) = samples.get(cursor).filter(|s| s.ts <= window_end) {
            if let Some(v) = sample.value {
                span.push(v);
            }
            cursor += 1;
        }
        let slot = if span.is_empty() {
            0.0
        } else {
            round2(aggregate(&span, kind)?)
        };
        out.push(Some(slot));
    }
    Ok(out)
}
