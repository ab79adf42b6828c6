//! JSON run summary: per-device stage statistics and arrival jitter.

#![allow(clippy::cast_precision_loss)]

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::csv_export::create;
use crate::aggregation::{AggregationStore, IngestStats};
use crate::correlation::{FlowStore, Stage};
use crate::domain::ExportError;

/// Latency statistics of one stage on one device, in nanoseconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageStats {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

impl StageStats {
    /// `None` for an empty sample set
    #[must_use]
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        let min = *samples.iter().min()?;
        let max = *samples.iter().max()?;
        let sum: u128 = samples.iter().map(|&s| u128::from(s)).sum();
        Some(Self { count: samples.len(), min, max, mean: sum as f64 / samples.len() as f64 })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub flows: usize,
    pub stages: BTreeMap<Stage, StageStats>,
    pub arrivals: usize,
    /// Absent when the arrival log could not be reduced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub generated_at: String,
    pub ingest: IngestStats,
    pub devices: BTreeMap<String, DeviceSummary>,
}

/// Known durations of `stage` across every flow of `device`, in owner order
#[must_use]
pub fn stage_durations(flows: &FlowStore, device: &str, stage: Stage) -> Vec<u64> {
    flows.flows(device).filter_map(|record| record.stage(stage).duration).collect()
}

/// Build the summary of a drained store.
#[must_use]
pub fn summarize(store: &AggregationStore, ingest: IngestStats, generated_at: String) -> Summary {
    let mut devices: BTreeMap<String, DeviceSummary> = BTreeMap::new();

    for device in store.flows.devices() {
        let entry = devices.entry(device.to_owned()).or_default();
        entry.flows = store.flows.flows(device).count();
        for stage in Stage::ALL {
            let samples = stage_durations(&store.flows, device, stage);
            if let Some(stats) = StageStats::from_samples(&samples) {
                entry.stages.insert(stage, stats);
            }
        }
    }

    for (device, summary) in store.arrival_summaries() {
        let entry = devices.entry(device.to_owned()).or_default();
        entry.arrivals = store.arrivals.get(device).map_or(0, Vec::len);
        entry.jitter = summary.ok().map(|s| s.jitter);
    }

    Summary { generated_at, ingest, devices }
}

/// Serialize `summary` as pretty-printed JSON.
///
/// # Errors
/// Returns an error if serialization or the write fails
pub fn write_summary<W: Write>(mut writer: W, summary: &Summary) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write `summary_<stamp>.json` into `dir`.
///
/// # Errors
/// Returns an error if the file cannot be created or written
pub fn export_summary(dir: &Path, stamp: &str, summary: &Summary) -> Result<PathBuf, ExportError> {
    let path = dir.join(format!("summary_{stamp}.json"));
    write_summary(create(&path)?, summary)?;
    Ok(path)
}
