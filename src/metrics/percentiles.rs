use hdrhistogram::Histogram;
use serde::Serialize;

/// Order-statistic percentiles over the retained window.
///
/// Not interpolated: for percentile `p` over `n` ascending values the
/// estimate is `sorted[floor(p * n)]`, clamped to the maximum when the
/// index runs off the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindowPercentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl WindowPercentiles {
    /// `sorted` must already be in ascending order.
    pub fn from_sorted(sorted: &[f64]) -> Self {
        Self {
            p50: order_statistic(sorted, 0.50),
            p95: order_statistic(sorted, 0.95),
            p99: order_statistic(sorted, 0.99),
        }
    }
}

/// `sorted[floor(p * n)]`, the last element if that index is out of range,
/// and 0 for an empty slice.
pub fn order_statistic(sorted: &[f64], p: f64) -> f64 {
    let Some(&max) = sorted.last() else {
        return 0.0;
    };
    let index = (sorted.len() as f64 * p) as usize;
    sorted.get(index).copied().unwrap_or(max)
}

/// Lifetime latency estimates read from an HdrHistogram.
/// The histogram stores microseconds; everything here is milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct PercentileSet {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
    pub count: u64,
}

impl PercentileSet {
    /// Extract a full percentile set from an HdrHistogram.
    /// Returns zeroed values if the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::empty();
        }

        Self {
            min: us_to_ms(hist.min()),
            max: us_to_ms(hist.max()),
            mean: hist.mean() / 1_000.0,
            p50: us_to_ms(hist.value_at_percentile(50.0)),
            p95: us_to_ms(hist.value_at_percentile(95.0)),
            p99: us_to_ms(hist.value_at_percentile(99.0)),
            p999: us_to_ms(hist.value_at_percentile(99.9)),
            count: hist.len(),
        }
    }

    /// All-zero placeholder used before any samples are recorded.
    pub fn empty() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            p50: 0.0,
            p95: 0.0,
            p99: 0.0,
            p999: 0.0,
            count: 0,
        }
    }

    /// Convenience: is this set backed by at least one observation?
    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

fn us_to_ms(us: u64) -> f64 {
    us as f64 / 1_000.0
}
