//! Interarrival and jitter reduction.
//!
//! Jitter here is the mean absolute difference between consecutive
//! interarrival intervals, not a variance.

use crate::domain::ReduceError;

/// Result of reducing one device's arrival timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalSummary {
    /// `timestamps[i + 1] - timestamps[i]`, in order
    pub interarrivals: Vec<u64>,
    /// Mean `|interarrivals[j] - interarrivals[j - 1]|`, 0.0 with fewer than two intervals
    pub jitter: f64,
}

/// Reduce an ordered timestamp sequence to interarrival times and jitter.
///
/// # Errors
/// - [`ReduceError::InsufficientData`] for fewer than two timestamps
/// - [`ReduceError::OutOfOrder`] if any timestamp is smaller than its predecessor
#[allow(clippy::cast_precision_loss)]
pub fn reduce(timestamps: &[u64]) -> Result<ArrivalSummary, ReduceError> {
    if timestamps.len() < 2 {
        return Err(ReduceError::InsufficientData { len: timestamps.len() });
    }

    let interarrivals = timestamps
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            pair[1].checked_sub(pair[0]).ok_or(ReduceError::OutOfOrder {
                index: i + 1,
                previous: pair[0],
                current: pair[1],
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let jitter = if interarrivals.len() < 2 {
        0.0
    } else {
        let sum: f64 = interarrivals.windows(2).map(|w| w[1].abs_diff(w[0]) as f64).sum();
        sum / (interarrivals.len() - 1) as f64
    };

    Ok(ArrivalSummary { interarrivals, jitter })
}
