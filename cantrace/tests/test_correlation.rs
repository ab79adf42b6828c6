use cantrace::correlation::{ApplyOutcome, FlowStore, Stage};
use cantrace::decode::{decode_pipeline_event, testing::stage_bytes, PipelineEvent};
use cantrace::domain::{FlowId, OwnerId};

fn event(ts: u64, pid: u32, uid: u32, marker: &str, device: &str) -> PipelineEvent {
    decode_pipeline_event(&stage_bytes(ts, pid, uid, marker, device)).expect("valid sample")
}

fn apply_all(events: &[PipelineEvent]) -> FlowStore {
    let mut store = FlowStore::new();
    for event in events {
        store.apply(event);
    }
    store
}

#[test]
fn test_read_stage_end_to_end() {
    let store = apply_all(&[
        event(1000, 42, 7, "sys_enter_read", "can0"),
        event(1400, 42, 7, "sys_exit_read", "can0"),
    ]);

    let record = store.record("can0", OwnerId(7)).expect("record exists");
    assert_eq!(record.flow_id, FlowId(42));
    assert_eq!(record.read.enter_ts, 1000);
    assert_eq!(record.read.exit_ts, 1400);
    assert_eq!(record.read.duration, Some(400));
    assert_eq!(record.send.duration, None);
}

#[test]
fn test_interleaving_across_flows_does_not_matter() {
    let a = [
        event(100, 1, 10, "sys_enter_read", "can0"),
        event(180, 1, 10, "sys_exit_read", "can0"),
        event(200, 1, 10, "sys_enter_sendto", "can0"),
        event(260, 1, 10, "sys_exit_sendto", "can0"),
    ];
    let b = [
        event(110, 2, 20, "sys_enter_read", "can0"),
        event(150, 2, 20, "sys_exit_read", "can0"),
        event(300, 3, 30, "can_to_avtp_enter", "vcan1"),
        event(390, 3, 30, "can_to_avtp_exit", "vcan1"),
    ];

    let sequential: Vec<_> = a.iter().chain(b.iter()).cloned().collect();
    let interleaved: Vec<_> =
        a.iter().zip(b.iter()).flat_map(|(x, y)| [y.clone(), x.clone()]).collect();

    assert_eq!(apply_all(&sequential), apply_all(&interleaved));

    let store = apply_all(&interleaved);
    assert_eq!(store.record("can0", OwnerId(10)).unwrap().read.duration, Some(80));
    assert_eq!(store.record("can0", OwnerId(10)).unwrap().send.duration, Some(60));
    assert_eq!(store.record("can0", OwnerId(20)).unwrap().read.duration, Some(40));
    assert_eq!(store.record("vcan1", OwnerId(30)).unwrap().can_to_avtp.duration, Some(90));
}

#[test]
fn test_order_within_a_flow_matters() {
    let forward = apply_all(&[
        event(100, 1, 5, "sys_enter_read", "can0"),
        event(160, 1, 5, "sys_exit_read", "can0"),
    ]);
    let reversed = apply_all(&[
        event(160, 1, 5, "sys_exit_read", "can0"),
        event(100, 1, 5, "sys_enter_read", "can0"),
    ]);

    assert_eq!(forward.record("can0", OwnerId(5)).unwrap().read.duration, Some(60));
    // The exit had nothing to pair with when it arrived
    let late = reversed.record("can0", OwnerId(5)).unwrap();
    assert_eq!(late.read.duration, None);
    assert!(late.read.is_complete());
}

#[test]
fn test_latest_enter_wins() {
    let store = apply_all(&[
        event(100, 1, 5, "avtp_to_can_enter", "can1"),
        event(130, 1, 5, "avtp_to_can_enter", "can1"),
        event(150, 1, 5, "avtp_to_can_exit", "can1"),
    ]);
    assert_eq!(store.record("can1", OwnerId(5)).unwrap().avtp_to_can.duration, Some(20));
}

#[test]
fn test_exit_before_enter_is_an_anomaly() {
    let mut store = FlowStore::new();
    store.apply(&event(500, 1, 5, "sys_enter_sendto", "can0"));
    let outcome = store.apply(&event(400, 1, 5, "sys_exit_sendto", "can0"));

    assert_eq!(
        outcome,
        ApplyOutcome::ClockAnomaly { stage: Stage::Send, enter_ts: 500, exit_ts: 400 }
    );
    let send = store.record("can0", OwnerId(5)).unwrap().send;
    assert_eq!((send.enter_ts, send.exit_ts, send.duration), (500, 400, None));
}

#[test]
fn test_kernel_forwarding_chain() {
    // acfcan_tx → enter_forward_can_frame → exit_forward_can_frame
    let store = apply_all(&[
        event(1000, 0, 0, "acfcan_tx", "acfcan0"),
        event(1250, 0, 0, "enter_forward_can_frame", "acfcan0"),
        event(1600, 0, 0, "exit_forward_can_frame", "acfcan0"),
    ]);

    let record = store.record("acfcan0", OwnerId(0)).unwrap();
    assert_eq!(record.read.duration, Some(250));
    assert_eq!(record.send.duration, Some(350));
}

#[test]
fn test_unknown_marker_leaves_store_untouched() {
    let mut store = FlowStore::new();
    assert_eq!(store.apply(&event(1, 1, 1, "sys_enter_write", "can0")), ApplyOutcome::Unclassified);
    assert!(store.is_empty());
}

#[test]
fn test_devices_are_kept_apart() {
    let store = apply_all(&[
        event(100, 1, 7, "sys_enter_read", "can0"),
        event(120, 1, 7, "sys_enter_read", "can1"),
        event(200, 1, 7, "sys_exit_read", "can1"),
    ]);

    assert_eq!(store.devices().collect::<Vec<_>>(), vec!["can0", "can1"]);
    assert_eq!(store.record("can0", OwnerId(7)).unwrap().read.duration, None);
    assert_eq!(store.record("can1", OwnerId(7)).unwrap().read.duration, Some(80));
}
