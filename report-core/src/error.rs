use thiserror::Error;

use crate::aggregate::AggregationKind;

/// Caller contract violations.
///
/// Data-driven conditions (a missing column, an empty dataset) are not errors;
/// those surface as `Ok(None)` from the report builders.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("cannot aggregate an empty set of values")]
    EmptyInput,
    #[error("aggregation `{0}` is not supported for numeric series")]
    UnsupportedAggregation(AggregationKind),
    #[error("interval must be a positive number of milliseconds, got {0}")]
    InvalidInterval(i64),
    #[error("bucket ladder has no candidate widths")]
    EmptyLadder,
    #[error("time range {start}..{end} cannot be represented in milliseconds")]
    TimeRangeOverflow { start: i64, end: i64 },
    #[error("time range needs {count} buckets, more than the limit of {limit}")]
    TooManyBuckets { count: i64, limit: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
