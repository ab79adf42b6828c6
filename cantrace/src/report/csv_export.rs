//! CSV export of a drained aggregation store.
//!
//! Two files per report, sharing one timestamp suffix:
//! - `EventsCanAvtp_<stamp>.csv`: one row per flow with every stage's timestamps
//! - `EventsRecvTs_<stamp>.csv`: one row per interarrival interval

use chrono::{DateTime, Local};
use log::warn;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::aggregation::AggregationStore;
use crate::correlation::{FlowRecord, FlowStore};
use crate::domain::ExportError;

/// Paths written by [`export_csv`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub flows: PathBuf,
    pub arrivals: PathBuf,
}

#[derive(Serialize)]
struct FlowRow<'a> {
    #[serde(rename = "PID")]
    pid: u32,
    #[serde(rename = "UID")]
    uid: u32,
    #[serde(rename = "Dev")]
    dev: &'a str,
    #[serde(rename = "TimestampEnterRead")]
    enter_read: u64,
    #[serde(rename = "TimestampExitRead")]
    exit_read: u64,
    #[serde(rename = "TimeReadingCANBus")]
    read: Option<u64>,
    #[serde(rename = "TimestampEnterSendto")]
    enter_send: u64,
    #[serde(rename = "TimestampExitSendto")]
    exit_send: u64,
    #[serde(rename = "TimeWriting")]
    send: Option<u64>,
    #[serde(rename = "TimestampEnterCanToAvtp")]
    enter_can_to_avtp: u64,
    #[serde(rename = "TimestampExitCanToAvtp")]
    exit_can_to_avtp: u64,
    #[serde(rename = "TimeCanToAvtp")]
    can_to_avtp: Option<u64>,
    #[serde(rename = "TimestampEnterAvtpToCan")]
    enter_avtp_to_can: u64,
    #[serde(rename = "TimestampExitAvtpToCan")]
    exit_avtp_to_can: u64,
    #[serde(rename = "TimeAvtpToCan")]
    avtp_to_can: Option<u64>,
}

impl<'a> From<&'a FlowRecord> for FlowRow<'a> {
    fn from(record: &'a FlowRecord) -> Self {
        Self {
            pid: record.flow_id.0,
            uid: record.owner_id.0,
            dev: &record.device,
            enter_read: record.read.enter_ts,
            exit_read: record.read.exit_ts,
            read: record.read.duration,
            enter_send: record.send.enter_ts,
            exit_send: record.send.exit_ts,
            send: record.send.duration,
            enter_can_to_avtp: record.can_to_avtp.enter_ts,
            exit_can_to_avtp: record.can_to_avtp.exit_ts,
            can_to_avtp: record.can_to_avtp.duration,
            enter_avtp_to_can: record.avtp_to_can.enter_ts,
            exit_avtp_to_can: record.avtp_to_can.exit_ts,
            avtp_to_can: record.avtp_to_can.duration,
        }
    }
}

#[derive(Serialize)]
struct ArrivalRow<'a> {
    #[serde(rename = "Key")]
    key: &'a str,
    #[serde(rename = "InterarrivalTime (in nanoseconds)")]
    interarrival: u64,
    #[serde(rename = "Jitter")]
    jitter: String,
}

/// File name suffix for a report taken at `now`
#[must_use]
pub fn report_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Write one row per flow. Unknown durations are left empty.
///
/// # Errors
/// Returns an error if a row cannot be serialized or written
pub fn write_flow_csv<W: Write>(writer: W, flows: &FlowStore) -> Result<usize, ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    let mut rows = 0;
    for record in flows.iter() {
        csv.serialize(FlowRow::from(record))?;
        rows += 1;
    }
    if rows == 0 {
        // Keep the header even when nothing was traced
        csv.write_record(FLOW_HEADER)?;
    }
    csv.flush()?;
    Ok(rows)
}

/// Write one row per interarrival interval, repeating the device jitter.
///
/// Devices whose timestamps cannot be reduced are skipped with a warning.
///
/// # Errors
/// Returns an error if a row cannot be serialized or written
pub fn write_arrival_csv<W: Write>(
    writer: W,
    store: &AggregationStore,
) -> Result<usize, ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    let mut rows = 0;
    for (device, summary) in store.arrival_summaries() {
        let summary = match summary {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Skipping arrival times of {device}: {e}");
                continue;
            }
        };
        let jitter = format!("{:.6}", summary.jitter);
        for interarrival in summary.interarrivals {
            csv.serialize(ArrivalRow { key: device, interarrival, jitter: jitter.clone() })?;
            rows += 1;
        }
    }
    if rows == 0 {
        csv.write_record(ARRIVAL_HEADER)?;
    }
    csv.flush()?;
    Ok(rows)
}

/// Write both CSV files into `dir`.
///
/// # Errors
/// Returns an error if a file cannot be created or written
pub fn export_csv(
    dir: &Path,
    stamp: &str,
    store: &AggregationStore,
) -> Result<ReportFiles, ExportError> {
    let files = ReportFiles {
        flows: dir.join(format!("EventsCanAvtp_{stamp}.csv")),
        arrivals: dir.join(format!("EventsRecvTs_{stamp}.csv")),
    };

    write_flow_csv(create(&files.flows)?, &store.flows)?;
    write_arrival_csv(create(&files.arrivals)?, store)?;
    Ok(files)
}

pub(crate) fn create(path: &Path) -> Result<BufWriter<File>, ExportError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| ExportError::WriteFailed { path: path.display().to_string(), source })
}

const FLOW_HEADER: [&str; 15] = [
    "PID",
    "UID",
    "Dev",
    "TimestampEnterRead",
    "TimestampExitRead",
    "TimeReadingCANBus",
    "TimestampEnterSendto",
    "TimestampExitSendto",
    "TimeWriting",
    "TimestampEnterCanToAvtp",
    "TimestampExitCanToAvtp",
    "TimeCanToAvtp",
    "TimestampEnterAvtpToCan",
    "TimestampExitAvtpToCan",
    "TimeAvtpToCan",
];

const ARRIVAL_HEADER: [&str; 3] = ["Key", "InterarrivalTime (in nanoseconds)", "Jitter"];
