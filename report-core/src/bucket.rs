//! Time bucketing: adaptive width selection and contiguous bucket layout.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const MS_PER_HOUR: i64 = 3_600_000;

/// Candidate bucket widths for the hexbin graph, in hours (1h up to ~1 month).
pub const HEXBIN_GROUPING_HOURS: &[i64] = &[1, 4, 8, 24, 48, 96, 168, 336, 730];

/// Most buckets the hexbin graph tolerates before widening.
pub const HEXBIN_BUCKET_CEILING: usize = 42;

/// Hard cap on buckets or sampling dates produced for one series.
pub const MAX_BUCKETS: usize = 250_000;

/// `max_ts - min_ts`, clamped at 0. Fails when the span overflows `i64`.
fn span_ms(min_ts: i64, max_ts: i64) -> Result<i64> {
    max_ts
        .checked_sub(min_ts)
        .map(|span| span.max(0))
        .ok_or(Error::TimeRangeOverflow {
            start: min_ts,
            end: max_ts,
        })
}

/// Number of `width`-wide steps from `min_ts` needed to reach `max_ts`,
/// bounded by [`MAX_BUCKETS`].
fn step_count(min_ts: i64, max_ts: i64, width: i64) -> Result<i64> {
    if width <= 0 {
        return Err(Error::InvalidInterval(width));
    }
    let count = span_ms(min_ts, max_ts)? / width + 1;
    if count > MAX_BUCKETS as i64 {
        return Err(Error::TooManyBuckets {
            count,
            limit: MAX_BUCKETS,
        });
    }
    Ok(count)
}

/// Picks the narrowest ladder width that keeps `span / width` under `ceiling`.
///
/// The span is measured in whole hours. When no candidate satisfies the
/// ceiling the coarsest one is returned rather than failing.
pub fn select_bucket_width(
    min_ts: i64,
    max_ts: i64,
    ladder_hours: &[i64],
    ceiling: usize,
) -> Result<i64> {
    if let Some(&bad) = ladder_hours.iter().find(|&&p| p <= 0) {
        return Err(Error::InvalidInterval(bad.saturating_mul(MS_PER_HOUR)));
    }
    let coarsest = ladder_hours.iter().copied().max().ok_or(Error::EmptyLadder)?;

    let span_hours = span_ms(min_ts, max_ts)? / MS_PER_HOUR;
    let hours = ladder_hours
        .iter()
        .copied()
        .find(|&p| (span_hours as f64) / (p as f64) < ceiling as f64)
        .unwrap_or(coarsest);

    debug!(span_hours, width_hours = hours, ceiling, "selected bucket width");
    hours
        .checked_mul(MS_PER_HOUR)
        .ok_or(Error::InvalidInterval(i64::MAX))
}

/// How bucket width is derived for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Bucketing {
    /// Searched from a ladder of hour widths against a bucket-count ceiling.
    Adaptive { ladder_hours: Vec<i64>, ceiling: usize },
    /// Chosen by the caller directly.
    Fixed { width_ms: i64 },
}

impl Default for Bucketing {
    fn default() -> Self {
        Bucketing::Adaptive {
            ladder_hours: HEXBIN_GROUPING_HOURS.to_vec(),
            ceiling: HEXBIN_BUCKET_CEILING,
        }
    }
}

impl Bucketing {
    pub fn width(&self, min_ts: i64, max_ts: i64) -> Result<i64> {
        match self {
            Bucketing::Adaptive {
                ladder_hours,
                ceiling,
            } => select_bucket_width(min_ts, max_ts, ladder_hours, *ceiling),
            Bucketing::Fixed { width_ms } if *width_ms > 0 => Ok(*width_ms),
            Bucketing::Fixed { width_ms } => Err(Error::InvalidInterval(*width_ms)),
        }
    }
}

/// Half-open interval `[edge, edge + width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub edge: i64,
    pub width: i64,
}

impl Bucket {
    pub fn end(&self) -> i64 {
        self.edge.saturating_add(self.width)
    }

    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.edge && ts < self.end()
    }
}

/// Contiguous buckets anchored at `min_ts`, the last one containing `max_ts`.
/// Always yields at least one bucket.
pub fn bucket_edges(min_ts: i64, max_ts: i64, width: i64) -> Result<Vec<Bucket>> {
    let count = step_count(min_ts, max_ts, width)?;
    Ok((0..count)
        .map(|i| Bucket {
            edge: min_ts + i * width,
            width,
        })
        .collect())
}

/// Index of the bucket holding `ts` in a layout anchored at `min_ts`.
pub fn bucket_index(ts: i64, min_ts: i64, width: i64) -> Option<usize> {
    if ts < min_ts || width <= 0 {
        return None;
    }
    usize::try_from(ts.checked_sub(min_ts)? / width).ok()
}

/// The fixed sampling ladder `start, start + interval, ...` up to `end`.
pub fn sampling_dates(start: i64, end: i64, interval_ms: i64) -> Result<Vec<i64>> {
    if interval_ms <= 0 {
        return Err(Error::InvalidInterval(interval_ms));
    }
    if end < start {
        return Ok(Vec::new());
    }
    let count = step_count(start, end, interval_ms)?;
    Ok((0..count).map(|i| start + i * interval_ms).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_timestamp_uses_smallest_width() {
        let width = select_bucket_width(5_000, 5_000, HEXBIN_GROUPING_HOURS, 42).unwrap();
        assert_eq!(width, MS_PER_HOUR);
        let buckets = bucket_edges(5_000, 5_000, width).unwrap();
        assert_eq!(buckets.len(), 1);
        assert!(buckets[0].contains(5_000));
    }

    #[test]
    fn test_width_widens_with_span() {
        // 41 hours still fits hourly buckets, 42 does not.
        assert_eq!(
            select_bucket_width(0, 41 * MS_PER_HOUR, HEXBIN_GROUPING_HOURS, 42).unwrap(),
            MS_PER_HOUR
        );
        assert_eq!(
            select_bucket_width(0, 42 * MS_PER_HOUR, HEXBIN_GROUPING_HOURS, 42).unwrap(),
            4 * MS_PER_HOUR
        );
        assert_eq!(
            select_bucket_width(0, 30 * 24 * MS_PER_HOUR, HEXBIN_GROUPING_HOURS, 42).unwrap(),
            24 * MS_PER_HOUR
        );
    }

    #[test]
    fn test_ceiling_respected_across_spans() {
        let max_span_hours = 730 * 42 - 1;
        for span_hours in (0..max_span_hours).step_by(37) {
            for extra_ms in [0, MS_PER_HOUR / 2, MS_PER_HOUR - 1] {
                let max_ts = span_hours * MS_PER_HOUR + extra_ms;
                let width = select_bucket_width(0, max_ts, HEXBIN_GROUPING_HOURS, 42).unwrap();
                let buckets = bucket_edges(0, max_ts, width).unwrap();
                assert!(
                    buckets.len() <= 42,
                    "span {max_ts}ms produced {} buckets",
                    buckets.len()
                );
            }
        }
    }

    #[test]
    fn test_falls_back_to_coarsest() {
        let max_ts = 100_000 * MS_PER_HOUR;
        let width = select_bucket_width(0, max_ts, HEXBIN_GROUPING_HOURS, 42).unwrap();
        assert_eq!(width, 730 * MS_PER_HOUR);
        assert!(bucket_edges(0, max_ts, width).unwrap().len() > 42);
    }

    #[test]
    fn test_invalid_ladders() {
        assert_eq!(
            select_bucket_width(0, 1, &[], 42),
            Err(Error::EmptyLadder)
        );
        assert_eq!(
            select_bucket_width(0, 1, &[1, 0], 42),
            Err(Error::InvalidInterval(0))
        );
    }

    #[test]
    fn test_buckets_cover_range_without_gaps() {
        let (min_ts, max_ts, width) = (1_000, 10_500, 1_000);
        let buckets = bucket_edges(min_ts, max_ts, width).unwrap();
        assert_eq!(buckets.first().unwrap().edge, min_ts);
        assert!(buckets.last().unwrap().contains(max_ts));
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].end(), pair[1].edge);
        }
        for ts in min_ts..=max_ts {
            let holding = buckets.iter().filter(|b| b.contains(ts)).count();
            assert_eq!(holding, 1, "timestamp {ts}");
            assert!(buckets[bucket_index(ts, min_ts, width).unwrap()].contains(ts));
        }
    }

    #[test]
    fn test_fixed_bucketing() {
        assert_eq!(Bucketing::Fixed { width_ms: 500 }.width(0, 10), Ok(500));
        assert_eq!(
            Bucketing::Fixed { width_ms: -1 }.width(0, 10),
            Err(Error::InvalidInterval(-1))
        );
        assert_eq!(Bucketing::default().width(0, 0), Ok(MS_PER_HOUR));
    }

    #[test]
    fn test_sampling_dates() {
        assert_eq!(sampling_dates(0, 2_500, 1_000).unwrap(), vec![0, 1_000, 2_000]);
        assert_eq!(sampling_dates(7, 7, 1_000).unwrap(), vec![7]);
        assert_eq!(sampling_dates(0, 1, 0), Err(Error::InvalidInterval(0)));
    }

    #[test]
    fn test_extreme_timestamps_are_errors() {
        let (lo, hi) = (-9_000_000_000_000_000_000, 9_000_000_000_000_000_000);
        let overflow = Error::TimeRangeOverflow { start: lo, end: hi };
        assert_eq!(
            select_bucket_width(lo, hi, HEXBIN_GROUPING_HOURS, 42),
            Err(overflow.clone())
        );
        assert_eq!(bucket_edges(lo, hi, MS_PER_HOUR), Err(overflow.clone()));
        assert_eq!(sampling_dates(lo, hi, 1_000), Err(overflow));
        assert_eq!(bucket_index(hi, lo, MS_PER_HOUR), None);
    }

    #[test]
    fn test_bucket_count_is_capped() {
        // A stray epoch-zero row next to present-day timestamps.
        let now = 1_700_000_000_000;
        assert!(matches!(
            sampling_dates(0, now, 5_000),
            Err(Error::TooManyBuckets { limit: MAX_BUCKETS, .. })
        ));
        assert!(matches!(
            bucket_edges(0, now, 1_000),
            Err(Error::TooManyBuckets { .. })
        ));
        let edge = (MAX_BUCKETS as i64 - 1) * 10;
        assert_eq!(sampling_dates(0, edge, 10).unwrap().len(), MAX_BUCKETS);
    }
}
