//! Drill-down graph for a clicked hexbin: one line per cell over adaptive
//! time buckets.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accessor::{CELL_NAME_COLUMN, DATE_COLUMN, ENODEB_COLUMN, Table, number_at};
use crate::aggregate::{AggregationKind, aggregate, round2};
use crate::bucket::{Bucket, Bucketing, bucket_edges, bucket_index};
use crate::compose::{
    ComposeOptions, Composition, Domain, GroupSeries, RenderMode, SeriesValues, Summary,
    compose_series,
};
use crate::error::{Error, Result};
use crate::group::{EntityGroup, GroupOrder, group_by_entity, time_extent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexbinQuery {
    /// Column the hexbin layer colors by.
    pub field: String,
    /// The layer's color aggregation.
    pub aggregation: Option<AggregationKind>,
    #[serde(default)]
    pub bucketing: Bucketing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexbinGraph {
    #[serde(flatten)]
    pub chart: Composition,
    pub start_time: i64,
    pub end_time: i64,
    pub group_period: i64,
    /// Start of every bucket; each series has one value per entry.
    pub group_times: Vec<i64>,
}

/// Builds the graph for the rows aggregated into one hexbin.
///
/// `points` are the rows behind the clicked hexbin; the value-axis domain is
/// taken from every row of `table` so that graphs of different hexbins share
/// a scale. Returns `Ok(None)` for layers without a numeric aggregation, when a
/// required column is missing, or when no point carries a timestamp.
pub fn hexbin_graph<'r, T: Table>(
    table: &'r T,
    points: &[&'r T::Row],
    query: &HexbinQuery,
) -> Result<Option<HexbinGraph>> {
    let Some(kind) = query.aggregation.filter(|k| *k != AggregationKind::Count) else {
        return Ok(None);
    };
    if !kind.is_numeric() {
        return Err(Error::UnsupportedAggregation(kind));
    }

    let (Some(enodeb), Some(cell_name), Some(date), Some(value)) = (
        table.column(ENODEB_COLUMN),
        table.column(CELL_NAME_COLUMN),
        table.column(DATE_COLUMN),
        table.column(&query.field),
    ) else {
        debug!(field = %query.field, "hexbin columns unavailable");
        return Ok(None);
    };

    let groups = group_by_entity(
        points.iter().copied(),
        &enodeb,
        &value,
        &date,
        Some(&cell_name),
        GroupOrder::FirstSeen,
    );
    let Some((start, end)) = time_extent(&groups) else {
        return Ok(None);
    };

    let width = query.bucketing.width(start, end)?;
    let buckets = bucket_edges(start, end, width)?;
    debug!(
        groups = groups.len(),
        buckets = buckets.len(),
        width_ms = width,
        "building hexbin graph"
    );

    let composed = groups
        .iter()
        .map(|group| {
            Ok(GroupSeries {
                key: group.key.clone(),
                label: group.label.clone(),
                values: SeriesValues::Bucketed(bucket_values(group, &buckets, kind)?),
                summary: Summary::of(&group.values(), group.len()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let raw_extent = Domain::of(
        table
            .rows()
            .into_iter()
            .filter_map(|row| number_at(&value, row)),
    );
    let options = ComposeOptions {
        aggregation: Some(kind),
        mode: RenderMode::Independent,
        reverse: false,
    };

    Ok(Some(HexbinGraph {
        chart: compose_series(composed, &options, raw_extent),
        start_time: start,
        end_time: end,
        group_period: width,
        group_times: buckets.iter().map(|b| b.edge).collect(),
    }))
}

/// Aggregates the group's values per bucket; buckets without values are `None`.
fn bucket_values(
    group: &EntityGroup,
    buckets: &[Bucket],
    kind: AggregationKind,
) -> Result<Vec<Option<f64>>> {
    let Some(first) = buckets.first() else {
        return Ok(Vec::new());
    };

    let mut per_bucket: Vec<Vec<f64>> = vec![Vec::new(); buckets.len()];
    for sample in &group.samples {
        let (Some(v), Some(idx)) = (sample.value, bucket_index(sample.ts, first.edge, first.width)) else {
            continue;
        };
        if let Some(slot) = per_bucket.get_mut(idx) {
            slot.push(v);
        }
    }

    per_bucket
        .iter()
        .map(|values| {
            if values.is_empty() {
                Ok(None)
            } else {
                aggregate(values, kind).map(|a| Some(round2(a)))
            }
        })
        .collect()
}
