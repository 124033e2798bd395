//! Behavioral constants for dataset hosting and chart rendering.

/// Upper bound on rows accepted in a single upload.
pub const MAX_UPLOAD_ROWS: usize = 500_000;

pub const CHART_WIDTH: f64 = 720.0;
pub const CHART_HEIGHT: f64 = 260.0;

/// Stroke colors cycled through by series index. The stacked `SUM` series
/// always uses the foreground color.
pub const SERIES_PALETTE: &[&str] = &[
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
    "#9c755f", "#bab0ac",
];
