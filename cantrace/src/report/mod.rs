//! Report generation from a drained [`AggregationStore`](crate::aggregation::AggregationStore)
//!
//! - CSV files of flows and interarrival times
//! - A JSON summary with per-stage statistics
//! - Text histograms on stdout

pub mod csv_export;
pub mod display;
pub mod histogram;
pub mod summary;

pub use csv_export::{export_csv, report_stamp, write_arrival_csv, write_flow_csv, ReportFiles};
pub use display::{display_histograms, display_statistics, render_histograms};
pub use histogram::{Histogram, DEFAULT_BINS};
pub use summary::{
    export_summary, stage_durations, summarize, write_summary, DeviceSummary, StageStats, Summary,
};
