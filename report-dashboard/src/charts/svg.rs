use std::fmt::Write;

use chrono::DateTime;
use maud::{Markup, html};
use report_core::DataReport;

use super::{Bounds, PlotSeries, bounds, plot_series};
use crate::config::{CHART_HEIGHT, CHART_WIDTH, SERIES_PALETTE};

const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 150.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 30.0;

const TEXT_STYLE: &str = "fill: #333; font-family: sans-serif";
const SUM_COLOR: &str = "#222";

fn format_time(ts_ms: i64) -> String {
    match DateTime::from_timestamp_millis(ts_ms) {
        Some(dt) => dt.format("%m-%d %H:%M:%S").to_string(),
        None => ts_ms.to_string(),
    }
}

fn format_value(v: f64) -> String {
    if v == v.floor() && v.abs() < 1_000_000.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

fn color(index: usize, series: &PlotSeries<'_>, stacked: bool) -> &'static str {
    if stacked && series.key == report_core::compose::SUM_SERIES_KEY {
        SUM_COLOR
    } else {
        SERIES_PALETTE[index % SERIES_PALETTE.len()]
    }
}

struct Frame {
    bounds: Bounds,
    chart_w: f64,
    chart_h: f64,
}

impl Frame {
    fn x(&self, ts: i64) -> f64 {
        MARGIN_LEFT + self.bounds.x_ratio(ts) * self.chart_w
    }

    fn y(&self, value: f64) -> f64 {
        MARGIN_TOP + self.chart_h - self.bounds.y_ratio(value) * self.chart_h
    }

    fn polyline(&self, points: &[(i64, f64)]) -> String {
        let mut out = String::new();
        for &(ts, v) in points {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{:.1},{:.1}", self.x(ts), self.y(v));
        }
        out
    }

    /// Closed outline from the line down to the zero baseline.
    fn area(&self, points: &[(i64, f64)]) -> String {
        let (Some(&(first, _)), Some(&(last, _))) = (points.first(), points.last()) else {
            return String::new();
        };
        let base = self.y(0.0_f64.clamp(self.bounds.v_min, self.bounds.v_max));
        let mut out = format!("{:.1},{base:.1} ", self.x(first));
        out.push_str(&self.polyline(points));
        let _ = write!(out, " {:.1},{base:.1}", self.x(last));
        out
    }
}

/// Renders a report as a line chart, or an area chart in stacked mode.
/// `None` renders the "no data" placeholder.
pub fn render_report(report: Option<&DataReport>, label: &str) -> Markup {
    let Some(report) = report else {
        return empty_chart(label);
    };
    let series = plot_series(report);
    let Some(bounds) = bounds(&series, report.chart.domain, report.chart.stacked) else {
        return empty_chart(label);
    };
    let frame = Frame {
        bounds,
        chart_w: CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT,
        chart_h: CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM,
    };
    let legend_x = CHART_WIDTH - MARGIN_RIGHT + 10.0;
    let headline = match report.chart.summary_value {
        Some(v) if !report.chart.summary_title.is_empty() => {
            format!("{label} | {} {}", report.chart.summary_title, format_value(v))
        }
        _ => label.to_owned(),
    };

    html! {
        svg viewBox=(format!("0 0 {CHART_WIDTH} {CHART_HEIGHT}")) xmlns="http://www.w3.org/2000/svg" {
            rect width=(CHART_WIDTH) height=(CHART_HEIGHT) style="fill: #fff" {}
            text x=(MARGIN_LEFT) y="18" font-size="12" style=(TEXT_STYLE) { (headline) }
            text x=(MARGIN_LEFT - 5.0) y=(MARGIN_TOP + 10.0) font-size="10" text-anchor="end" style=(TEXT_STYLE) {
                (format_value(bounds.v_max))
            }
            text x=(MARGIN_LEFT - 5.0) y=(MARGIN_TOP + frame.chart_h) font-size="10" text-anchor="end" style=(TEXT_STYLE) {
                (format_value(bounds.v_min))
            }
            @for (i, s) in series.iter().enumerate() {
                @let stroke = color(i, s, report.chart.stacked);
                @if s.area {
                    polygon points=(frame.area(&s.points)) opacity="0.25" style=(format!("fill: {stroke}")) {}
                }
                polyline points=(frame.polyline(&s.points)) fill="none" stroke-width="2" style=(format!("stroke: {stroke}")) {
                    title { (s.legend.unwrap_or(s.key)) }
                }
                @let legend_y = MARGIN_TOP + 12.0 + i as f64 * 14.0;
                rect x=(legend_x) y=(legend_y - 8.0) width="8" height="8" style=(format!("fill: {stroke}")) {}
                text x=(legend_x + 12.0) y=(legend_y) font-size="10" style=(TEXT_STYLE) {
                    (s.legend.unwrap_or(s.key))
                }
            }
            (x_axis(&frame))
        }
    }
}

fn x_axis(frame: &Frame) -> Markup {
    let label_y = CHART_HEIGHT - 8.0;
    let mid = frame.bounds.t_min + (frame.bounds.t_max - frame.bounds.t_min) / 2;
    html! {
        text x=(MARGIN_LEFT) y=(label_y) font-size="10" text-anchor="start" style=(TEXT_STYLE) {
            (format_time(frame.bounds.t_min))
        }
        @if frame.bounds.t_max > frame.bounds.t_min {
            text x=(frame.x(mid)) y=(label_y) font-size="10" text-anchor="middle" style=(TEXT_STYLE) {
                (format_time(mid))
            }
            text x=(MARGIN_LEFT + frame.chart_w) y=(label_y) font-size="10" text-anchor="end" style=(TEXT_STYLE) {
                (format_time(frame.bounds.t_max))
            }
        }
    }
}

fn empty_chart(label: &str) -> Markup {
    html! {
        svg viewBox=(format!("0 0 {CHART_WIDTH} {CHART_HEIGHT}")) xmlns="http://www.w3.org/2000/svg" {
            rect width=(CHART_WIDTH) height=(CHART_HEIGHT) style="fill: #fff" {}
            text x=(CHART_WIDTH / 2.0) y=(CHART_HEIGHT / 2.0) font-size="14" text-anchor="middle" style=(TEXT_STYLE) {
                (label) ": no data"
            }
        }
    }
}
