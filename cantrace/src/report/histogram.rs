//! Fixed-width text histograms of latency samples.

// Bin arithmetic loses precision only when drawing bars
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::fmt::Write as _;

/// Number of bins used for every report histogram
pub const DEFAULT_BINS: usize = 20;

/// Width of the longest bar, in characters
const BAR_WIDTH: usize = 40;

/// Counts of samples in equally sized bins spanning `[min, max]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    title: String,
    min: u64,
    bin_width: u64,
    counts: Vec<u64>,
}

impl Histogram {
    /// Bin `samples`; `None` when there is nothing to bin.
    #[must_use]
    pub fn build(title: impl Into<String>, samples: &[u64], bins: usize) -> Option<Self> {
        let min = *samples.iter().min()?;
        let max = *samples.iter().max()?;
        let bins = bins.max(1);

        // Ceiling division so the top bin includes `max`
        let span = u128::from(max - min) + 1;
        let bin_width = span.div_ceil(bins as u128).max(1);
        let bin_width = u64::try_from(bin_width).unwrap_or(u64::MAX);

        let mut counts = vec![0u64; bins];
        for &sample in samples {
            let index = ((sample - min) / bin_width) as usize;
            counts[index.min(bins - 1)] += 1;
        }

        Some(Self { title: title.into(), min, bin_width, counts })
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Inclusive lower bound of bin `index`
    #[must_use]
    pub fn lower_bound(&self, index: usize) -> u64 {
        self.min.saturating_add(self.bin_width.saturating_mul(index as u64))
    }

    /// Render as one line per bin: range, bar, count.
    #[must_use]
    pub fn render(&self) -> String {
        let peak = self.counts.iter().copied().max().unwrap_or(0).max(1);
        let mut out = String::new();
        let _ = writeln!(out, "{} ({} samples)", self.title, self.total());

        for (index, &count) in self.counts.iter().enumerate() {
            let low = self.lower_bound(index);
            let high = self.lower_bound(index + 1).saturating_sub(1);
            let bar_len = (count as f64 / peak as f64 * BAR_WIDTH as f64).round() as usize;
            let _ = writeln!(
                out,
                "{low:>12} - {high:<12} │{:<BAR_WIDTH$}│ {count}",
                "█".repeat(bar_len)
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_samples() {
        assert!(Histogram::build("read", &[], DEFAULT_BINS).is_none());
    }

    #[test]
    fn test_single_value_fills_first_bin() {
        let hist = Histogram::build("read", &[400, 400, 400], DEFAULT_BINS).unwrap();
        assert_eq!(hist.counts()[0], 3);
        assert_eq!(hist.total(), 3);
        assert_eq!(hist.counts().len(), DEFAULT_BINS);
    }

    #[test]
    fn test_samples_spread_across_bins() {
        let samples: Vec<u64> = (0..20).collect();
        let hist = Histogram::build("send", &samples, 20).unwrap();
        assert!(hist.counts().iter().all(|&c| c == 1));
        assert_eq!(hist.lower_bound(19), 19);
    }

    #[test]
    fn test_max_lands_in_last_bin() {
        let hist = Histogram::build("gap", &[0, 1_000, 999], 4).unwrap();
        assert_eq!(hist.counts(), &[1, 0, 0, 2]);
    }

    #[test]
    fn test_full_range_does_not_overflow() {
        let hist = Histogram::build("wide", &[0, u64::MAX], 2).unwrap();
        assert_eq!(hist.counts(), &[1, 1]);
    }

    #[test]
    fn test_render_lists_every_bin() {
        let hist = Histogram::build("can0 read", &[1, 2, 3], 3).unwrap();
        let text = hist.render();
        assert!(text.starts_with("can0 read (3 samples)"));
        assert_eq!(text.lines().count(), 4);
    }
}
