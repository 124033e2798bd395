use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reducer applied to the values of one bucket.
///
/// Only the numeric kinds can be computed here; `Count`, `Mode` and
/// `CountUnique` exist so that a layer's configured aggregation can be
/// represented and rejected explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    Count,
    Average,
    Maximum,
    Minimum,
    Median,
    Stdev,
    Sum,
    Variance,
    Mode,
    #[serde(rename = "count unique")]
    CountUnique,
}

impl AggregationKind {
    pub const NUMERIC: [AggregationKind; 7] = [
        AggregationKind::Average,
        AggregationKind::Maximum,
        AggregationKind::Minimum,
        AggregationKind::Median,
        AggregationKind::Stdev,
        AggregationKind::Sum,
        AggregationKind::Variance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationKind::Count => "count",
            AggregationKind::Average => "average",
            AggregationKind::Maximum => "maximum",
            AggregationKind::Minimum => "minimum",
            AggregationKind::Median => "median",
            AggregationKind::Stdev => "stdev",
            AggregationKind::Sum => "sum",
            AggregationKind::Variance => "variance",
            AggregationKind::Mode => "mode",
            AggregationKind::CountUnique => "count unique",
        }
    }

    pub fn is_numeric(&self) -> bool {
        Self::NUMERIC.contains(self)
    }

    /// Whether charts of this kind pin the value axis to the raw data extent.
    /// Kinds whose output lives on a different scale than the raw samples let
    /// the axis auto-scale instead.
    pub fn fixes_axis(&self) -> bool {
        matches!(
            self,
            AggregationKind::Average | AggregationKind::Minimum | AggregationKind::Maximum
        )
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown aggregation `{0}`")]
pub struct UnknownAggregation(pub String);

impl FromStr for AggregationKind {
    type Err = UnknownAggregation;

    /// Accepts the canonical names plus the short labels used by report
    /// pickers (`avg`, `min`, `max`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(AggregationKind::Count),
            "average" | "avg" | "mean" => Ok(AggregationKind::Average),
            "maximum" | "max" => Ok(AggregationKind::Maximum),
            "minimum" | "min" => Ok(AggregationKind::Minimum),
            "median" => Ok(AggregationKind::Median),
            "stdev" => Ok(AggregationKind::Stdev),
            "sum" => Ok(AggregationKind::Sum),
            "variance" => Ok(AggregationKind::Variance),
            "mode" => Ok(AggregationKind::Mode),
            "count unique" | "countunique" => Ok(AggregationKind::CountUnique),
            _ => Err(UnknownAggregation(s.to_string())),
        }
    }
}

/// Reduces a non-empty slice with the given kind.
///
/// Spread measures are population statistics (divisor `n`), so a single
/// sample has a spread of exactly 0.
pub fn aggregate(values: &[f64], kind: AggregationKind) -> Result<f64> {
    let reduce: fn(&[f64]) -> f64 = match kind {
        AggregationKind::Average => mean,
        AggregationKind::Sum => |v: &[f64]| v.iter().sum::<f64>(),
        AggregationKind::Minimum => |v: &[f64]| v.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationKind::Maximum => |v: &[f64]| v.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationKind::Median => median,
        AggregationKind::Variance => population_variance,
        AggregationKind::Stdev => |v: &[f64]| population_variance(v).sqrt(),
        AggregationKind::Count | AggregationKind::Mode | AggregationKind::CountUnique => {
            return Err(Error::UnsupportedAggregation(kind));
        }
    };
    if values.is_empty() {
        return Err(Error::EmptyInput);
    }
    Ok(reduce(values))
}

/// Rounds to 2 decimal places. Idempotent on already-rounded values.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn population_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}
