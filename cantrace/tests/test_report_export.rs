use cantrace::aggregation::{AggregationStore, IngestStats};
use cantrace::correlation::FlowStore;
use cantrace::decode::{decode_pipeline_event, testing::stage_bytes};
use cantrace::report::{export_csv, export_summary, summarize};

fn sample_store() -> AggregationStore {
    let mut flows = FlowStore::new();
    for (ts, pid, uid, marker, device) in [
        (1000, 42, 7, "sys_enter_read", "can0"),
        (1400, 42, 7, "sys_exit_read", "can0"),
        (1500, 42, 7, "sys_enter_sendto", "can0"),
        (1520, 43, 8, "can_to_avtp_enter", "can0"),
        (1580, 43, 8, "can_to_avtp_exit", "can0"),
    ] {
        let event = decode_pipeline_event(&stage_bytes(ts, pid, uid, marker, device)).unwrap();
        flows.apply(&event);
    }

    let mut store = AggregationStore { flows, ..AggregationStore::default() };
    store.arrivals.insert("can0".to_string(), vec![100, 250, 300]);
    store
}

#[test]
fn test_export_writes_both_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let files = export_csv(dir.path(), "20240101_120000", &sample_store()).unwrap();

    assert_eq!(files.flows.file_name().unwrap(), "EventsCanAvtp_20240101_120000.csv");
    assert_eq!(files.arrivals.file_name().unwrap(), "EventsRecvTs_20240101_120000.csv");

    let mut reader = csv::Reader::from_path(&files.flows).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "PID");
    assert_eq!(&headers[5], "TimeReadingCANBus");
    assert_eq!(headers.len(), 15);

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "42");
    assert_eq!(&rows[0][5], "400");
    // Send entered but never exited
    assert_eq!(&rows[0][6], "1500");
    assert_eq!(&rows[0][8], "");
    assert_eq!(&rows[1][1], "8");
    assert_eq!(&rows[1][11], "60");

    let arrivals = std::fs::read_to_string(&files.arrivals).unwrap();
    let lines: Vec<_> = arrivals.lines().collect();
    assert_eq!(lines[0], "Key,InterarrivalTime (in nanoseconds),Jitter");
    assert_eq!(&lines[1..], ["can0,150,100.000000", "can0,50,100.000000"]);
}

#[test]
fn test_export_summary_json() {
    let dir = tempfile::tempdir().unwrap();
    let store = sample_store();
    let stats = IngestStats { pipeline_events: 5, arrival_events: 3, ..IngestStats::default() };
    let summary = summarize(&store, stats, "20240101_120000".to_string());

    let path = export_summary(dir.path(), "20240101_120000", &summary).unwrap();
    assert_eq!(path.file_name().unwrap(), "summary_20240101_120000.json");

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let can0 = &value["devices"]["can0"];
    assert_eq!(can0["flows"], 2);
    assert_eq!(can0["stages"]["read"]["count"], 1);
    assert_eq!(can0["stages"]["can_to_avtp"]["min"], 60);
    assert!(can0["stages"].get("send").is_none());
    assert_eq!(can0["jitter"], 100.0);
    assert_eq!(value["ingest"]["pipeline_events"], 5);
}

#[test]
fn test_export_into_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let err = export_csv(&missing, "x", &AggregationStore::default()).unwrap_err();
    assert!(err.to_string().contains("Failed to write report file"));
}
