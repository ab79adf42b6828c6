//! Event aggregation
//!
//! Funnels decoded events from independent ring buffer readers into one
//! store owned by a single task, and hands consistent copies to reporting.

pub mod coordinator;

pub use coordinator::{
    AggregationStore, Aggregator, AggregatorHandle, ArrivalPublisher, IngestStats, RecordSink,
    StagePublisher, DEFAULT_CHANNEL_CAPACITY,
};
