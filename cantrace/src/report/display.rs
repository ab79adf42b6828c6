use crate::aggregation::{AggregationStore, IngestStats};
use crate::correlation::Stage;

use super::histogram::Histogram;
use super::summary::stage_durations;

/// Display ingest statistics
pub fn display_statistics(stats: &IngestStats) {
    eprintln!(
        "stats: stage_events={} arrivals={} malformed={} unclassified={} clock_anomalies={}",
        stats.pipeline_events,
        stats.arrival_events,
        stats.malformed,
        stats.unclassified,
        stats.clock_anomalies
    );
}

/// Render a histogram of every stage on every device, then of every interarrival log.
#[must_use]
pub fn render_histograms(store: &AggregationStore, bins: usize) -> String {
    let mut out = String::new();

    for device in store.flows.devices() {
        for stage in Stage::ALL {
            let samples = stage_durations(&store.flows, device, stage);
            let title = format!("{} at {device} (ns)", stage.title());
            if let Some(hist) = Histogram::build(title, &samples, bins) {
                out.push_str(&hist.render());
                out.push('\n');
            }
        }
    }

    for (device, summary) in store.arrival_summaries() {
        let Ok(summary) = summary else { continue };
        let title = format!("Interarrival time at {device} (ns)");
        if let Some(hist) = Histogram::build(title, &summary.interarrivals, bins) {
            out.push_str(&hist.render());
        }
        out.push_str(&format!("Jitter at {device}: {:.3} ns\n\n", summary.jitter));
    }

    out
}

/// Print [`render_histograms`] to stdout
pub fn display_histograms(store: &AggregationStore, bins: usize) {
    let text = render_histograms(store, bins);
    if text.is_empty() {
        println!("No complete stages or arrival intervals recorded");
    } else {
        print!("{text}");
    }
}
