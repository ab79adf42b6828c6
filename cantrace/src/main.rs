//! # cantrace - Main Entry Point
//!
//! Loads the probes, streams both ring buffers into the aggregator until
//! Ctrl-C or `--duration`, then writes the reports.

// Main function is intentionally long for clarity
#![allow(clippy::too_many_lines)]

use anyhow::{bail, Context, Result};
use aya::maps::RingBuf;
use chrono::Local;
use clap::Parser;
use log::{info, warn};
use std::time::{Duration, Instant};
use tokio::sync::watch;

use cantrace::aggregation::Aggregator;
use cantrace::cli::Args;
use cantrace::preflight::run_preflight_checks;
use cantrace::probes::{attach_probes, init_ebpf_logger, load_probes, pump_ring_buf};
use cantrace::report::{
    display_histograms, display_statistics, export_csv, export_summary, report_stamp, summarize,
    DEFAULT_BINS,
};
use cantrace_common::{ARRIVAL_RING_BUF, STAGE_RING_BUF};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else if msg.contains("file not found") || msg.contains("not a file") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    run_preflight_checks(&args)?;

    if !quiet {
        println!("cantrace v{}", env!("CARGO_PKG_VERSION"));
        println!("object: {}", args.object.display());
        println!("mode: {}", if args.is_kernel { "kernel module" } else { "user space" });
    }

    // ── Load and attach ─────────────────────────────────────────────────
    let mut bpf = load_probes(&args.object, &args.probe_config())?;
    init_ebpf_logger(&mut bpf);

    let attached = attach_probes(&mut bpf, &args.probe_targets());
    if attached.attached == 0 {
        bail!("None of the probes could be attached");
    }
    if !quiet {
        println!("probes: {} attached, {} failed", attached.attached, attached.failed);
    }

    let stage_ring = RingBuf::try_from(
        bpf.take_map(STAGE_RING_BUF).with_context(|| format!("{STAGE_RING_BUF} map not found"))?,
    )?;
    let arrival_ring = RingBuf::try_from(
        bpf.take_map(ARRIVAL_RING_BUF)
            .with_context(|| format!("{ARRIVAL_RING_BUF} map not found"))?,
    )?;

    // ── Readers and aggregator ──────────────────────────────────────────
    let (handle, stages, arrivals) = Aggregator::spawn(args.channel_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let stage_pump =
        tokio::spawn(pump_ring_buf(STAGE_RING_BUF, stage_ring, stages, shutdown_rx.clone()));
    let arrival_pump =
        tokio::spawn(pump_ring_buf(ARRIVAL_RING_BUF, arrival_ring, arrivals, shutdown_rx));

    // ── Wait for Ctrl-C or the duration limit ───────────────────────────
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let tracing_start = Instant::now();
    let duration_limit = async {
        if args.duration > 0 {
            tokio::time::sleep(Duration::from_secs(args.duration)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(duration_limit);

    let stats_enabled = args.stats_interval > 0;
    let mut stats_timer = tokio::time::interval(Duration::from_secs(args.stats_interval.max(1)));
    // First tick completes immediately
    stats_timer.tick().await;

    if !quiet {
        println!("tracing... (Ctrl-C to stop)");
    }

    let exit_reason = loop {
        tokio::select! {
            _ = &mut ctrl_c => break "interrupted",
            () = &mut duration_limit => break "duration limit reached",
            _ = stats_timer.tick(), if stats_enabled => match handle.stats().await {
                Ok(stats) => info!(
                    "{} stage events, {} arrivals, {} malformed, {} unclassified, {} clock anomalies",
                    stats.pipeline_events,
                    stats.arrival_events,
                    stats.malformed,
                    stats.unclassified,
                    stats.clock_anomalies
                ),
                Err(e) => {
                    warn!("Aggregator unavailable: {e}");
                    break "aggregator stopped";
                }
            },
        }
    };

    // ── Shutdown: stop readers, let the aggregator apply what they forwarded ──
    let _ = shutdown_tx.send(true);
    for (name, pump) in [(STAGE_RING_BUF, stage_pump), (ARRIVAL_RING_BUF, arrival_pump)] {
        match pump.await {
            Ok(Ok(forwarded)) => info!("{name}: {forwarded} samples forwarded"),
            Ok(Err(e)) => warn!("{name} reader failed: {e:#}"),
            Err(e) => warn!("{name} reader panicked: {e}"),
        }
    }
    let (store, stats) =
        handle.finish_with_stats().await.context("Failed to collect aggregated events")?;

    if !quiet {
        eprintln!(
            "\n{exit_reason}: {:.1}s, {} flows on {} devices",
            tracing_start.elapsed().as_secs_f64(),
            store.flows.len(),
            store.flows.devices().count()
        );
        display_statistics(&stats);
    }

    // ── Reports ─────────────────────────────────────────────────────────
    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("Failed to create output directory {}", args.output_dir.display())
    })?;
    let stamp = report_stamp(Local::now());

    let files = export_csv(&args.output_dir, &stamp, &store).context("Failed to export CSV")?;
    let summary = summarize(&store, stats, stamp.clone());
    let summary_path =
        export_summary(&args.output_dir, &stamp, &summary).context("Failed to export summary")?;

    if !quiet {
        println!("saved: {}", files.flows.display());
        println!("saved: {}", files.arrivals.display());
        println!("saved: {}", summary_path.display());
    }

    if !args.no_histograms {
        display_histograms(&store, DEFAULT_BINS);
    }

    Ok(())
}
