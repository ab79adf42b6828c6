//! Ring buffer consumption.
//!
//! One reader task per ring buffer. Each waits for readiness on the map's
//! file descriptor, copies out every available sample, then forwards them
//! to its [`RecordSink`] in ring order. Forwarding applies back-pressure:
//! a slow aggregator makes the reader wait, and the kernel side drops
//! records once the ring is full.

use anyhow::{Context, Result};
use aya::maps::{MapData, RingBuf};
use log::{debug, warn};
use tokio::io::unix::AsyncFd;
use tokio::sync::watch;

use crate::aggregation::RecordSink;

/// Pump `ring_buf` into `sink` until `shutdown` fires.
///
/// Samples already sitting in the ring when shutdown fires are still
/// forwarded. Returns the number of samples handed to the sink.
///
/// # Errors
/// Returns an error if the ring buffer cannot be polled or the sink has closed
pub async fn pump_ring_buf<S: RecordSink>(
    name: &str,
    ring_buf: RingBuf<MapData>,
    sink: S,
    mut shutdown: watch::Receiver<bool>,
) -> Result<u64> {
    let mut async_fd =
        AsyncFd::new(ring_buf).with_context(|| format!("Failed to poll ring buffer {name}"))?;
    let mut forwarded = 0u64;
    let mut batch: Vec<Vec<u8>> = Vec::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            ready = async_fd.readable_mut() => {
                let mut guard = ready.with_context(|| format!("Ring buffer {name} poll error"))?;
                let ring = guard.get_inner_mut();
                while let Some(item) = ring.next() {
                    batch.push(item.to_vec());
                }
                guard.clear_ready();
            }
        }
        forwarded += forward(name, &sink, &mut batch).await?;
    }

    // Final drain of whatever the probes wrote before shutdown
    let ring = async_fd.get_mut();
    while let Some(item) = ring.next() {
        batch.push(item.to_vec());
    }
    forwarded += forward(name, &sink, &mut batch).await?;

    debug!("Ring buffer {name}: forwarded {forwarded} samples");
    Ok(forwarded)
}

async fn forward<S: RecordSink>(name: &str, sink: &S, batch: &mut Vec<Vec<u8>>) -> Result<u64> {
    let mut forwarded = 0;
    for sample in batch.drain(..) {
        // Empty record indicates ring buffer overflow
        if sample.is_empty() {
            warn!("Ring buffer {name} overflow detected");
            continue;
        }
        sink.publish(&sample)
            .await
            .with_context(|| format!("Aggregator stopped while reading {name}"))?;
        forwarded += 1;
    }
    Ok(forwarded)
}
