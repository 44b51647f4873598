//! Summary statistics over a completed sample set.
//!
//! The first sample of a run is dominated by connection setup and cold
//! caches. It is reported on its own as `initial` and excluded from every
//! other statistic.

use serde::Serialize;

/// Summary of one run's samples, all values in raw cycles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleSummary {
    /// Total samples collected, including the initial one.
    pub count: usize,
    /// The excluded first sample.
    pub initial: u64,
    /// Minimum of the retained samples.
    pub min: u64,
    /// Maximum of the retained samples.
    pub max: u64,
    /// Median of the retained samples (see [`median_index`]).
    pub median: u64,
    /// Arithmetic mean of the retained samples.
    pub mean: f64,
    /// Population standard deviation of the retained samples.
    pub stddev: f64,
    /// Requested percentiles as (percentile, cycles) pairs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub percentiles: Vec<(f64, u64)>,
}

impl SampleSummary {
    /// Number of samples the statistics were computed over.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.count - 1
    }

    /// Spread between the slowest and fastest retained sample.
    #[must_use]
    pub fn jitter(&self) -> u64 {
        self.max - self.min
    }
}

/// Index into the sorted retained samples used as the median.
///
/// Anchored to the full sample count `n`, not the retained count `n - 1`,
/// so for even `n` it lands one past the conventional median. For `n = 2`
/// it is clamped to the only retained element.
#[must_use]
pub fn median_index(n: usize) -> usize {
    (n / 2).min(n.saturating_sub(2))
}

/// Reduce a completed sample set.
///
/// Returns `None` when fewer than two samples exist, since nothing would
/// remain after excluding the initial one.
#[must_use]
pub fn reduce(samples: &[u64]) -> Option<SampleSummary> {
    reduce_with_percentiles(samples, &[])
}

/// Reduce a completed sample set and also compute `percentiles`.
///
/// Percentiles outside `0.0..=100.0` (or NaN) are skipped.
#[must_use]
pub fn reduce_with_percentiles(samples: &[u64], percentiles: &[f64]) -> Option<SampleSummary> {
    let (&initial, rest) = samples.split_first()?;
    if rest.is_empty() {
        return None;
    }

    let mut sorted = rest.to_vec();
    sorted.sort_unstable();

    let retained = sorted.len() as f64;
    let sum: u128 = sorted.iter().map(|&x| u128::from(x)).sum();
    let mean = sum as f64 / retained;

    let squares: f64 = sorted
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum();
    let stddev = (squares / retained).sqrt();

    let percentiles = percentiles
        .iter()
        .filter(|&&p| (0.0..=100.0).contains(&p))
        .map(|&p| {
            let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
            (p, sorted[idx.min(sorted.len() - 1)])
        })
        .collect();

    Some(SampleSummary {
        count: samples.len(),
        initial,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        median: sorted[median_index(samples.len())],
        mean,
        stddev,
        percentiles,
    })
}
