//! Turns a report into plot-ready point lists for the SVG renderer.

use report_core::{DataReport, Domain, RenderType, SeriesValues};

pub mod svg;

pub struct PlotSeries<'a> {
    pub key: &'a str,
    pub legend: Option<&'a str>,
    pub area: bool,
    /// `(timestamp ms, value)`; buckets and samples without a value are skipped.
    pub points: Vec<(i64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub t_min: i64,
    pub t_max: i64,
    pub v_min: f64,
    pub v_max: f64,
}

impl Bounds {
    /// Position of `ts` in `[0, 1]`.
    pub fn x_ratio(&self, ts: i64) -> f64 {
        let span = (self.t_max - self.t_min).max(1) as f64;
        (ts - self.t_min) as f64 / span
    }

    /// Position of `value` in `[0, 1]`, 0 being the bottom of the axis.
    pub fn y_ratio(&self, value: f64) -> f64 {
        let range = self.v_max - self.v_min;
        if range.abs() < f64::EPSILON {
            0.5
        } else {
            (value - self.v_min) / range
        }
    }
}

pub fn plot_series(report: &DataReport) -> Vec<PlotSeries<'_>> {
    report
        .chart
        .series
        .iter()
        .map(|series| {
            let points = match &series.values {
                SeriesValues::Bucketed(values) => report
                    .sampling_dates
                    .iter()
                    .flatten()
                    .zip(values)
                    .filter_map(|(&ts, value)| value.map(|v| (ts, v)))
                    .collect(),
                SeriesValues::Raw(pairs) => pairs
                    .iter()
                    .filter_map(|&(ts, value)| value.map(|v| (ts, v)))
                    .collect(),
            };
            PlotSeries {
                key: &series.key,
                legend: series.legend.as_deref(),
                area: series.render_type == RenderType::Area,
                points,
            }
        })
        .collect()
}

/// Extent of every plotted point, widened to the report's value domain when
/// it has one. Areas are drawn down to zero, so stacked charts include it.
pub fn bounds(series: &[PlotSeries<'_>], domain: Option<Domain>, stacked: bool) -> Option<Bounds> {
    let mut points = series.iter().flat_map(|s| s.points.iter().copied());
    let (first_ts, first_v) = points.next()?;
    let mut b = Bounds {
        t_min: first_ts,
        t_max: first_ts,
        v_min: first_v,
        v_max: first_v,
    };
    for (ts, v) in points {
        b.t_min = b.t_min.min(ts);
        b.t_max = b.t_max.max(ts);
        b.v_min = b.v_min.min(v);
        b.v_max = b.v_max.max(v);
    }
    if let Some(domain) = domain {
        b.v_min = b.v_min.min(domain.min);
        b.v_max = b.v_max.max(domain.max);
    }
    if stacked {
        b.v_min = b.v_min.min(0.0);
        b.v_max = b.v_max.max(0.0);
    }
    Some(b)
}
