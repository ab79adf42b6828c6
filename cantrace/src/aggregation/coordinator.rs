//! # Aggregation Actor
//!
//! A single tokio task owns the [`AggregationStore`] and is its only writer.
//! Producers never touch the maps: they decode their ring buffer samples and
//! hand typed events over a bounded channel, one channel per source.
//!
//! ```text
//! events_can_avtp ──► StagePublisher ──(mpsc)──┐
//!                                              ├──► Aggregator ──► AggregationStore
//! events_recv_ts ──► ArrivalPublisher ──(mpsc)─┘        ▲
//!                                                       │ snapshot / drain / stats
//!                                              AggregatorHandle
//! ```
//!
//! Events from one source are applied in the order they were published; the
//! two sources are not ordered against each other, which is fine since they
//! update disjoint maps. Control requests are served between two events, so
//! a snapshot never observes a half-applied update.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::arrival::{reduce, ArrivalSummary};
use crate::correlation::{ApplyOutcome, FlowStore};
use crate::decode::{decode_arrival_event, decode_pipeline_event, ArrivalEvent, PipelineEvent};
use crate::domain::{AggregatorError, ReduceError};

/// Default capacity of each producer channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Everything collected so far: stage timings per flow and arrival times per device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationStore {
    pub flows: FlowStore,
    /// Arrival timestamps per device, in the order they were read
    pub arrivals: BTreeMap<String, Vec<u64>>,
}

impl AggregationStore {
    /// Reduce every device's arrival log.
    ///
    /// Devices are yielded in name order; a failed reduction is returned as
    /// is so the caller can decide to skip that device.
    pub fn arrival_summaries(
        &self,
    ) -> impl Iterator<Item = (&str, Result<ArrivalSummary, ReduceError>)> {
        self.arrivals.iter().map(|(device, timestamps)| (device.as_str(), reduce(timestamps)))
    }

    /// Total number of arrival timestamps across devices
    #[must_use]
    pub fn arrival_count(&self) -> usize {
        self.arrivals.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty() && self.arrivals.is_empty()
    }
}

/// Ingest counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Stage events applied (including unclassified ones)
    pub pipeline_events: u64,
    pub arrival_events: u64,
    /// Samples rejected by the decoder
    pub malformed: u64,
    /// Stage events whose marker is outside the vocabulary
    pub unclassified: u64,
    /// Exits observed before their enter
    pub clock_anomalies: u64,
}

enum Command {
    Snapshot(oneshot::Sender<AggregationStore>),
    Drain(oneshot::Sender<AggregationStore>),
    Stats(oneshot::Sender<IngestStats>),
}

/// Destination for raw ring buffer samples
pub trait RecordSink {
    /// Decode one sample and forward it to the aggregator.
    ///
    /// Malformed samples are counted and dropped, not reported as errors.
    ///
    /// # Errors
    /// Returns [`AggregatorError::Closed`] once the aggregator has stopped.
    fn publish(&self, bytes: &[u8]) -> impl Future<Output = Result<(), AggregatorError>> + Send;
}

/// Producer side of the pipeline-stage channel
#[derive(Clone)]
pub struct StagePublisher {
    tx: mpsc::Sender<PipelineEvent>,
    malformed: Arc<AtomicU64>,
}

impl RecordSink for StagePublisher {
    async fn publish(&self, bytes: &[u8]) -> Result<(), AggregatorError> {
        match decode_pipeline_event(bytes) {
            Ok(event) => self.tx.send(event).await.map_err(|_| AggregatorError::Closed),
            Err(e) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping malformed sample: {e}");
                Ok(())
            }
        }
    }
}

/// Producer side of the arrival channel
#[derive(Clone)]
pub struct ArrivalPublisher {
    tx: mpsc::Sender<ArrivalEvent>,
    malformed: Arc<AtomicU64>,
}

impl RecordSink for ArrivalPublisher {
    async fn publish(&self, bytes: &[u8]) -> Result<(), AggregatorError> {
        match decode_arrival_event(bytes) {
            Ok(event) => self.tx.send(event).await.map_err(|_| AggregatorError::Closed),
            Err(e) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping malformed sample: {e}");
                Ok(())
            }
        }
    }
}

/// Control side of a running aggregator
pub struct AggregatorHandle {
    control: mpsc::Sender<Command>,
    malformed: Arc<AtomicU64>,
    task: JoinHandle<(AggregationStore, IngestStats)>,
}

impl AggregatorHandle {
    /// Point-in-time copy of the store; the aggregator keeps its state.
    ///
    /// # Errors
    /// Returns [`AggregatorError::Closed`] if the aggregator has stopped.
    pub async fn snapshot(&self) -> Result<AggregationStore, AggregatorError> {
        self.request(Command::Snapshot).await
    }

    /// Take the store, leaving the aggregator with an empty one.
    ///
    /// # Errors
    /// Returns [`AggregatorError::Closed`] if the aggregator has stopped.
    pub async fn drain(&self) -> Result<AggregationStore, AggregatorError> {
        self.request(Command::Drain).await
    }

    /// Current ingest counters.
    ///
    /// # Errors
    /// Returns [`AggregatorError::Closed`] if the aggregator has stopped.
    pub async fn stats(&self) -> Result<IngestStats, AggregatorError> {
        let mut stats = self.request(Command::Stats).await?;
        stats.malformed = self.malformed.load(Ordering::Relaxed);
        Ok(stats)
    }

    /// Wait for the aggregator to apply every buffered event and return the final store.
    ///
    /// Completes once every publisher has been dropped.
    ///
    /// # Errors
    /// Returns [`AggregatorError::Join`] if the aggregation task panicked.
    pub async fn finish(self) -> Result<AggregationStore, AggregatorError> {
        Ok(self.finish_with_stats().await?.0)
    }

    /// [`finish`](Self::finish), also returning the final ingest counters.
    ///
    /// # Errors
    /// Returns [`AggregatorError::Join`] if the aggregation task panicked.
    pub async fn finish_with_stats(
        self,
    ) -> Result<(AggregationStore, IngestStats), AggregatorError> {
        let Self { control, malformed, task } = self;
        drop(control);
        let (store, mut stats) = task.await?;
        stats.malformed = malformed.load(Ordering::Relaxed);
        Ok((store, stats))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, AggregatorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control.send(command(reply_tx)).await.map_err(|_| AggregatorError::Closed)?;
        reply_rx.await.map_err(|_| AggregatorError::Closed)
    }
}

/// The aggregation task state
pub struct Aggregator {
    store: AggregationStore,
    stats: IngestStats,
    stage_rx: mpsc::Receiver<PipelineEvent>,
    arrival_rx: mpsc::Receiver<ArrivalEvent>,
    control_rx: mpsc::Receiver<Command>,
}

impl Aggregator {
    /// Start the aggregation task on the current tokio runtime.
    ///
    /// Publishers are `Clone`; every clone feeds the same channel.
    #[must_use]
    pub fn spawn(capacity: usize) -> (AggregatorHandle, StagePublisher, ArrivalPublisher) {
        let capacity = capacity.max(1);
        let (stage_tx, stage_rx) = mpsc::channel(capacity);
        let (arrival_tx, arrival_rx) = mpsc::channel(capacity);
        let (control_tx, control_rx) = mpsc::channel(16);
        let malformed = Arc::new(AtomicU64::new(0));

        let aggregator = Self {
            store: AggregationStore::default(),
            stats: IngestStats::default(),
            stage_rx,
            arrival_rx,
            control_rx,
        };
        let task = tokio::spawn(aggregator.run());

        (
            AggregatorHandle { control: control_tx, malformed: Arc::clone(&malformed), task },
            StagePublisher { tx: stage_tx, malformed: Arc::clone(&malformed) },
            ArrivalPublisher { tx: arrival_tx, malformed },
        )
    }

    async fn run(mut self) -> (AggregationStore, IngestStats) {
        let mut stage_open = true;
        let mut arrival_open = true;
        let mut control_open = true;

        while stage_open || arrival_open {
            tokio::select! {
                event = self.stage_rx.recv(), if stage_open => match event {
                    Some(event) => self.apply_stage(&event),
                    None => {
                        debug!("Stage channel closed");
                        stage_open = false;
                    }
                },
                event = self.arrival_rx.recv(), if arrival_open => match event {
                    Some(event) => self.apply_arrival(event),
                    None => {
                        debug!("Arrival channel closed");
                        arrival_open = false;
                    }
                },
                command = self.control_rx.recv(), if control_open => match command {
                    Some(command) => self.handle(command),
                    None => control_open = false,
                },
            }
        }

        // Requests queued before the producers went away still get an answer
        while let Ok(command) = self.control_rx.try_recv() {
            self.handle(command);
        }

        (self.store, self.stats)
    }

    fn apply_stage(&mut self, event: &PipelineEvent) {
        self.stats.pipeline_events += 1;
        match self.store.flows.apply(event) {
            ApplyOutcome::Recorded => {}
            ApplyOutcome::Unclassified => self.stats.unclassified += 1,
            ApplyOutcome::ClockAnomaly { stage, enter_ts, exit_ts } => {
                self.stats.clock_anomalies += 1;
                warn!(
                    "{} {} exited {stage} at {exit_ts} before entering at {enter_ts}, duration unknown",
                    event.device, event.owner_id
                );
            }
        }
    }

    fn apply_arrival(&mut self, event: ArrivalEvent) {
        self.stats.arrival_events += 1;
        self.store.arrivals.entry(event.device).or_default().push(event.timestamp);
    }

    fn handle(&mut self, command: Command) {
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            Command::Snapshot(reply) => {
                let _ = reply.send(self.store.clone());
            }
            Command::Drain(reply) => {
                let _ = reply.send(std::mem::take(&mut self.store));
            }
            Command::Stats(reply) => {
                let _ = reply.send(self.stats);
            }
        }
    }
}
