//! Assembly of per-entity aggregates into a chart-ready series list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{AggregationKind, aggregate, round2};

/// Key of the synthetic cumulative series added in stacked mode.
pub const SUM_SERIES_KEY: &str = "SUM";

/// How per-entity series relate to each other on the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Every entity is its own line.
    #[default]
    #[serde(rename = "normal")]
    Independent,
    /// Entities are drawn as areas and a cumulative `SUM` series is added.
    #[serde(rename = "stacked_sum")]
    StackedSum,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Independent => "normal",
            RenderMode::StackedSum => "stacked_sum",
        }
    }

    /// Label shown in report pickers.
    pub fn label(&self) -> &'static str {
        match self {
            RenderMode::Independent => "independent",
            RenderMode::StackedSum => "stacked sum",
        }
    }

    pub fn render_type(&self) -> RenderType {
        match self {
            RenderMode::Independent => RenderType::Line,
            RenderMode::StackedSum => RenderType::Area,
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown report type `{0}`")]
pub struct UnknownRenderMode(pub String);

impl FromStr for RenderMode {
    type Err = UnknownRenderMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" | "independent" => Ok(RenderMode::Independent),
            "stacked_sum" | "stacked sum" | "stacked" => Ok(RenderMode::StackedSum),
            _ => Err(UnknownRenderMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderType {
    Line,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesValues {
    /// One slot per bucket of the shared time axis. `None` marks a bucket the
    /// entity had no values in.
    Bucketed(Vec<Option<f64>>),
    /// Unaggregated `[timestamp, value]` pairs.
    Raw(Vec<(i64, Option<f64>)>),
}

impl SeriesValues {
    pub fn len(&self) -> usize {
        match self {
            SeriesValues::Bucketed(v) => v.len(),
            SeriesValues::Raw(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-series statistics over the raw (pre-bucketing) values, 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: usize,
}

impl Summary {
    /// `count` is passed separately because rows without a value still count.
    pub fn of(values: &[f64], count: usize) -> Self {
        let stat = |kind| aggregate(values, kind).ok().map(round2);
        Summary {
            avg: stat(AggregationKind::Average),
            min: stat(AggregationKind::Minimum),
            max: stat(AggregationKind::Maximum),
            count,
        }
    }
}

/// Value-axis extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub min: f64,
    pub max: f64,
}

impl Domain {
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values.into_iter().fold(None, |acc, v| {
            Some(match acc {
                None => Domain { min: v, max: v },
                Some(d) => Domain {
                    min: d.min.min(v),
                    max: d.max.max(v),
                },
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
    pub render_type: RenderType,
    pub values: SeriesValues,
    pub summary: Summary,
}

/// One entity's values, ready to be composed.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSeries {
    pub key: String,
    pub label: Option<String>,
    pub values: SeriesValues,
    pub summary: Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComposeOptions {
    pub aggregation: Option<AggregationKind>,
    pub mode: RenderMode,
    /// Emit series in reverse iteration order. Color assignment downstream
    /// follows the emitted order.
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub stacked: bool,
    pub series: Vec<Series>,
    /// Set only for aggregations that keep values on the raw scale.
    pub domain: Option<Domain>,
    pub summary_title: String,
    pub summary_value: Option<f64>,
}

/// Builds the final series list.
///
/// In stacked mode the `SUM` series is accumulated across groups in iteration
/// order (before any reversal), rounded at every step, and appended last. The
/// headline figure is the mean of per-series averages in independent mode and
/// their sum in stacked mode.
pub fn compose_series(
    groups: Vec<GroupSeries>,
    options: &ComposeOptions,
    raw_extent: Option<Domain>,
) -> Composition {
    let stacked = options.mode == RenderMode::StackedSum;
    let mut running: Option<Vec<f64>> = None;
    let mut avgs = Vec::with_capacity(groups.len());
    let mut series = Vec::with_capacity(groups.len() + 1);

    for group in groups {
        if let Some(avg) = group.summary.avg {
            avgs.push(avg);
        }

        let render_type = match (&group.values, options.aggregation) {
            (SeriesValues::Bucketed(values), Some(_)) => {
                if stacked {
                    let totals = running.get_or_insert_with(|| vec![0.0; values.len()]);
                    if totals.len() < values.len() {
                        totals.resize(values.len(), 0.0);
                    }
                    for (total, v) in totals.iter_mut().zip(values) {
                        *total = round2(*total + v.unwrap_or(0.0));
                    }
                }
                options.mode.render_type()
            }
            _ => RenderType::Line,
        };

        let legend = match (options.aggregation, group.summary.avg) {
            (Some(_), Some(avg)) => Some(format!("{}: {avg}", group.key)),
            _ => None,
        };

        series.push(Series {
            key: group.key,
            label: group.label,
            legend,
            render_type,
            values: group.values,
            summary: group.summary,
        });
    }

    if options.reverse {
        series.reverse();
    }

    if let Some(totals) = running {
        series.push(Series {
            key: SUM_SERIES_KEY.to_string(),
            label: None,
            legend: None,
            render_type: RenderType::Area,
            summary: Summary::of(&totals, totals.len()),
            values: SeriesValues::Bucketed(totals.into_iter().map(Some).collect()),
        });
    }

    let (summary_title, summary_value) = match options.aggregation {
        None => (String::new(), None),
        Some(_) => {
            let (title, headline) = if stacked {
                ("SUM AVG", AggregationKind::Sum)
            } else {
                ("AVG", AggregationKind::Average)
            };
            (
                title.to_string(),
                aggregate(&avgs, headline).ok().map(round2),
            )
        }
    };

    let domain = options
        .aggregation
        .filter(AggregationKind::fixes_axis)
        .and(raw_extent);

    Composition {
        stacked,
        series,
        domain,
        summary_title,
        summary_value,
    }
}
