//! Per-flow stage correlation.
//!
//! Events of one flow arrive interleaved with those of every other flow. The
//! store keys records by `(device, owner_id)`, so each event only ever
//! touches its own record and cross-flow interleaving cannot change the
//! result. Within a flow the order matters: the latest enter wins, and a
//! duration is taken at exit time against whatever enter is retained then.

use std::collections::BTreeMap;

use log::trace;

use super::classify::{classify_all, Boundary, Stage};
use crate::decode::PipelineEvent;
use crate::domain::{FlowId, OwnerId};

/// Enter/exit timestamps of one stage (0 = not seen yet)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTiming {
    pub enter_ts: u64,
    pub exit_ts: u64,
    /// `exit_ts - enter_ts`, set when an exit lands on a known enter
    ///
    /// Stays `None` when the stage is incomplete, or when the exit preceded
    /// the enter (see [`ApplyOutcome::ClockAnomaly`]).
    pub duration: Option<u64>,
}

impl StageTiming {
    /// Both boundaries have been observed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.enter_ts != 0 && self.exit_ts != 0
    }

    fn enter(&mut self, ts: u64) {
        self.enter_ts = ts;
    }

    /// Record an exit; returns `false` if it precedes the retained enter.
    fn exit(&mut self, ts: u64) -> bool {
        self.exit_ts = ts;
        if !self.is_complete() {
            return true;
        }
        match ts.checked_sub(self.enter_ts) {
            Some(elapsed) => {
                self.duration = Some(elapsed);
                true
            }
            None => {
                self.duration = None;
                false
            }
        }
    }
}

/// Aggregated stage timings of one flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRecord {
    pub owner_id: OwnerId,
    /// Process of the event that created this record
    pub flow_id: FlowId,
    pub device: String,
    pub read: StageTiming,
    pub send: StageTiming,
    pub can_to_avtp: StageTiming,
    pub avtp_to_can: StageTiming,
}

impl FlowRecord {
    #[must_use]
    pub fn new(device: &str, owner_id: OwnerId, flow_id: FlowId) -> Self {
        Self {
            owner_id,
            flow_id,
            device: device.to_owned(),
            read: StageTiming::default(),
            send: StageTiming::default(),
            can_to_avtp: StageTiming::default(),
            avtp_to_can: StageTiming::default(),
        }
    }

    #[must_use]
    pub fn stage(&self, stage: Stage) -> &StageTiming {
        match stage {
            Stage::Read => &self.read,
            Stage::Send => &self.send,
            Stage::CanToAvtp => &self.can_to_avtp,
            Stage::AvtpToCan => &self.avtp_to_can,
        }
    }

    pub fn stage_mut(&mut self, stage: Stage) -> &mut StageTiming {
        match stage {
            Stage::Read => &mut self.read,
            Stage::Send => &mut self.send,
            Stage::CanToAvtp => &mut self.can_to_avtp,
            Stage::AvtpToCan => &mut self.avtp_to_can,
        }
    }
}

/// What [`FlowStore::apply`] did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Timestamps stored
    Recorded,
    /// Marker outside the vocabulary; no record was created or touched
    Unclassified,
    /// Exit earlier than the retained enter; the stage duration is unknown
    ClockAnomaly { stage: Stage, enter_ts: u64, exit_ts: u64 },
}

/// `device → owner_id → FlowRecord`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowStore {
    devices: BTreeMap<String, BTreeMap<OwnerId, FlowRecord>>,
}

impl FlowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one stage event to its flow, creating the record if needed.
    pub fn apply(&mut self, event: &PipelineEvent) -> ApplyOutcome {
        let mut transitions = classify_all(&event.stage_marker).peekable();
        if transitions.peek().is_none() {
            trace!("unclassified marker {:?} on {}", event.stage_marker, event.device);
            return ApplyOutcome::Unclassified;
        }

        let ts = event.timestamp;
        self.update(&event.device, event.owner_id, event.flow_id, |record| {
            let mut outcome = ApplyOutcome::Recorded;
            for (stage, boundary) in transitions.filter_map(|t| t.parts()) {
                let timing = record.stage_mut(stage);
                match boundary {
                    Boundary::Enter => timing.enter(ts),
                    Boundary::Exit => {
                        if !timing.exit(ts) {
                            outcome = ApplyOutcome::ClockAnomaly {
                                stage,
                                enter_ts: timing.enter_ts,
                                exit_ts: ts,
                            };
                        }
                    }
                }
            }
            outcome
        })
    }

    /// Mutate the record for `(device, owner_id)` in place.
    ///
    /// A missing record is created first (all stages unset), stamped with
    /// `flow_id`; an existing record keeps the `flow_id` it was created with.
    pub fn update<R>(
        &mut self,
        device: &str,
        owner_id: OwnerId,
        flow_id: FlowId,
        mutator: impl FnOnce(&mut FlowRecord) -> R,
    ) -> R {
        let record = self
            .devices
            .entry(device.to_owned())
            .or_default()
            .entry(owner_id)
            .or_insert_with(|| FlowRecord::new(device, owner_id, flow_id));
        mutator(record)
    }

    #[must_use]
    pub fn record(&self, device: &str, owner_id: OwnerId) -> Option<&FlowRecord> {
        self.devices.get(device)?.get(&owner_id)
    }

    /// Flows of one device, ordered by owner id
    pub fn flows(&self, device: &str) -> impl Iterator<Item = &FlowRecord> {
        self.devices.get(device).into_iter().flat_map(BTreeMap::values)
    }

    /// Devices with at least one record, in name order
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Every record, grouped by device
    pub fn iter(&self) -> impl Iterator<Item = &FlowRecord> {
        self.devices.values().flat_map(BTreeMap::values)
    }

    /// Total number of records across all devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(device: &str, owner: u32, marker: &str, ts: u64) -> PipelineEvent {
        PipelineEvent {
            timestamp: ts,
            flow_id: FlowId(100),
            owner_id: OwnerId(owner),
            stage_marker: marker.to_string(),
            device: device.to_string(),
        }
    }

    #[test]
    fn test_read_enter_then_exit() {
        let mut store = FlowStore::new();
        store.apply(&event("can0", 7, "sys_enter_read", 1000));
        store.apply(&event("can0", 7, "sys_exit_read", 1400));

        let record = store.record("can0", OwnerId(7)).unwrap();
        assert_eq!(
            record.read,
            StageTiming { enter_ts: 1000, exit_ts: 1400, duration: Some(400) }
        );
        assert_eq!(record.send, StageTiming::default());
        assert_eq!(record.can_to_avtp, StageTiming::default());
        assert_eq!(record.avtp_to_can, StageTiming::default());
    }

    #[test]
    fn test_enter_only_has_no_duration() {
        let mut store = FlowStore::new();
        store.apply(&event("talker", 1, "can_to_avtp_enter", 50));
        let timing = store.record("talker", OwnerId(1)).unwrap().can_to_avtp;
        assert_eq!(timing.enter_ts, 50);
        assert_eq!(timing.duration, None);
        assert!(!timing.is_complete());
    }

    #[test]
    fn test_exit_without_enter_creates_record_without_duration() {
        let mut store = FlowStore::new();
        assert_eq!(store.apply(&event("listener", 3, "avtp_to_can_exit", 80)), ApplyOutcome::Recorded);
        let timing = store.record("listener", OwnerId(3)).unwrap().avtp_to_can;
        assert_eq!(timing, StageTiming { enter_ts: 0, exit_ts: 80, duration: None });
    }

    #[test]
    fn test_reentry_keeps_latest_enter() {
        let mut store = FlowStore::new();
        store.apply(&event("can0", 7, "sys_enter_sendto", 100));
        store.apply(&event("can0", 7, "sys_enter_sendto", 300));
        store.apply(&event("can0", 7, "sys_exit_sendto", 350));
        let send = store.record("can0", OwnerId(7)).unwrap().send;
        assert_eq!(send.enter_ts, 300);
        assert_eq!(send.duration, Some(50));
    }

    #[test]
    fn test_late_enter_does_not_recompute_duration() {
        let mut store = FlowStore::new();
        store.apply(&event("can0", 7, "sys_enter_read", 100));
        store.apply(&event("can0", 7, "sys_exit_read", 150));
        store.apply(&event("can0", 7, "sys_enter_read", 120));
        let read = store.record("can0", OwnerId(7)).unwrap().read;
        assert_eq!(read.enter_ts, 120);
        assert_eq!(read.duration, Some(50));
    }

    #[test]
    fn test_exit_before_enter_is_clock_anomaly() {
        let mut store = FlowStore::new();
        store.apply(&event("can0", 7, "sys_enter_read", 1000));
        let outcome = store.apply(&event("can0", 7, "sys_exit_read", 900));
        assert_eq!(
            outcome,
            ApplyOutcome::ClockAnomaly { stage: Stage::Read, enter_ts: 1000, exit_ts: 900 }
        );
        let read = store.record("can0", OwnerId(7)).unwrap().read;
        assert_eq!(read.exit_ts, 900);
        assert_eq!(read.duration, None);
    }

    #[test]
    fn test_handoff_marker_closes_read_and_opens_send() {
        let mut store = FlowStore::new();
        store.apply(&event("ecu1", 2, "acfcan_tx", 10));
        store.apply(&event("ecu1", 2, "enter_forward_can_frame", 25));
        store.apply(&event("ecu1", 2, "exit_forward_can_frame", 70));

        let record = store.record("ecu1", OwnerId(2)).unwrap();
        assert_eq!(record.read.duration, Some(15));
        assert_eq!(record.send.enter_ts, 25);
        assert_eq!(record.send.duration, Some(45));
    }

    #[test]
    fn test_unknown_marker_leaves_store_untouched() {
        let mut store = FlowStore::new();
        assert_eq!(store.apply(&event("can0", 1, "sched_switch", 5)), ApplyOutcome::Unclassified);
        assert!(store.is_empty());
    }

    #[test]
    fn test_flow_id_comes_from_first_event() {
        let mut store = FlowStore::new();
        let mut first = event("talker", 9, "can_to_avtp_enter", 1);
        first.flow_id = FlowId(11);
        let mut second = event("talker", 9, "can_to_avtp_exit", 2);
        second.flow_id = FlowId(22);
        store.apply(&first);
        store.apply(&second);
        assert_eq!(store.record("talker", OwnerId(9)).unwrap().flow_id, FlowId(11));
    }

    #[test]
    fn test_same_owner_on_different_devices_is_separate() {
        let mut store = FlowStore::new();
        store.apply(&event("talker", 1, "sys_enter_read", 1));
        store.apply(&event("listener", 1, "sys_enter_read", 2));
        assert_eq!(store.len(), 2);
        assert_eq!(store.devices().collect::<Vec<_>>(), vec!["listener", "talker"]);
        assert_eq!(store.flows("talker").count(), 1);
        assert_eq!(store.flows("missing").count(), 0);
    }

    #[test]
    fn test_update_mutates_in_place() {
        let mut store = FlowStore::new();
        store.update("can0", OwnerId(4), FlowId(1), |r| r.read.enter_ts = 42);
        let enter = store.update("can0", OwnerId(4), FlowId(2), |r| r.read.enter_ts);
        assert_eq!(enter, 42);
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
    }
}
