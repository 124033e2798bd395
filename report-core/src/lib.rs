//! Time-series grouping and aggregation for chart-ready reports.
//!
//! Takes a flat table of timestamped, entity-tagged samples and turns it into
//! bucketed, aggregated series per entity. Two call sites share the pipeline:
//! the data report ([`report`]) and the hexbin drill-down graph ([`hexbin`]).

pub mod accessor;
pub mod aggregate;
pub mod bucket;
pub mod compose;
pub mod dataset;
pub mod error;
pub mod group;
pub mod hexbin;
pub mod memo;
pub mod report;

pub use accessor::{Accessor, FieldValue, Table};
pub use aggregate::{AggregationKind, aggregate, round2};
pub use bucket::{Bucket, Bucketing, select_bucket_width};
pub use compose::{Composition, Domain, RenderMode, RenderType, Series, SeriesValues, Summary};
pub use dataset::{DataTable, Field, FieldKind};
pub use error::{Error, Result};
pub use hexbin::{HexbinGraph, HexbinQuery, hexbin_graph};
pub use memo::{GraphKey, MemoSlot};
pub use report::{DataReport, ReportConfig, generate_data_report};
