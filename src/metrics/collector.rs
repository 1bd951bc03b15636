use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use super::percentiles::{PercentileSet, WindowPercentiles};
use super::rollup::RollupView;
use super::{RequestOutcome, Sample, SampleView};
use crate::error::{MonitorError, MonitorResult};

// ─── Configuration ───────────────────────────────────────────────

/// How many entries the top-N path / endpoint tables keep
const TOP_N: usize = 10;

/// HdrHistogram range: 1 μs → 1 h, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 3_600_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe metrics engine.
/// The host calls `record()` once per completed request; stats endpoints,
/// health checks and report jobs call the query methods.
///
/// Two scopes live side by side: a bounded ring buffer of the most recent
/// samples (windowed figures) and lifetime counters that eviction never
/// touches (totals, throughput, frequency tables).
pub struct MetricsCollector {
    inner: Mutex<Inner>,
    capacity: usize,
    zone: FixedOffset,
}

/// One name and how often it was seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCount {
    pub name: String,
    pub count: u64,
}

/// A bucket in the lifetime latency distribution.
#[derive(Debug, Clone, Serialize)]
pub struct DistBucket {
    pub range_start_ms: f64,
    pub range_end_ms: f64,
    pub count: u64,
}

/// Point-in-time view returned by [`MetricsCollector::snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    // Lifetime
    pub uptime_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub total_requests: u64,
    pub total_errors: u64,
    pub requests_per_second: f64,
    pub error_rate: f64,

    // Retained window
    pub average_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
    pub response_time_percentiles: WindowPercentiles,
    pub recent_request_count: usize,
    pub capacity: usize,

    // Lifetime latency estimates
    pub lifetime_latency: PercentileSet,
    pub distribution: Vec<DistBucket>,

    // Lifetime frequency tables
    pub status_codes: BTreeMap<u16, u64>,
    /// Highest count first; ties keep first-seen order.
    pub top_paths: Vec<RankedCount>,
    pub top_methods: BTreeMap<String, u64>,
    pub top_endpoints: Vec<RankedCount>,
    pub error_types: BTreeMap<String, u64>,
}

/// Per-endpoint figures over the retained window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub average_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
    pub error_count: u64,
    pub error_rate: f64,
    pub status_codes: BTreeMap<u16, u64>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    // Rolling window of recent individual requests
    history: VecDeque<Sample>,

    // Lifetime counters
    total_requests: u64,
    total_errors: u64,
    status_codes: BTreeMap<u16, u64>,
    paths: FrequencyTable,
    methods: BTreeMap<String, u64>,
    endpoints: FrequencyTable,
    error_types: BTreeMap<String, u64>,

    // Lifetime latency, microseconds
    latency_hist: Histogram<u64>,

    // Anchors for uptime
    start_time: Instant,
    started_at: DateTime<Utc>,
}

/// Counts keyed by name, remembering when each key first appeared so that
/// rankings break ties deterministically.
struct FrequencyTable {
    /// name → (count, first-seen sequence number)
    entries: HashMap<String, (u64, u64)>,
    next_seq: u64,
}

// ─── MetricsCollector impl ───────────────────────────────────────

impl MetricsCollector {
    /// Collector retaining the `capacity` most recent samples, binning
    /// rollups in UTC.
    pub fn new(capacity: usize) -> MonitorResult<Self> {
        Self::with_zone(capacity, Utc.fix())
    }

    /// Collector whose calendar rollups bin hours and weekdays in `zone`.
    pub fn with_zone(capacity: usize, zone: FixedOffset) -> MonitorResult<Self> {
        if capacity == 0 {
            return Err(MonitorError::InvalidCapacity { what: "history" });
        }
        Ok(Self {
            inner: Mutex::new(Inner::new(capacity)),
            capacity,
            zone,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a completed request, stamped with the current time.
    pub fn record(&self, outcome: RequestOutcome) {
        trace!(route = %outcome.route, status = outcome.status_code, "recording sample");
        self.inner.lock().record_now(outcome, self.capacity);
    }

    /// Record a completed request with an explicit completion time.
    /// Callers are responsible for keeping timestamps in order.
    pub fn record_at(&self, outcome: RequestOutcome, timestamp: DateTime<Utc>) {
        let sample = Sample::stamp(outcome, timestamp);
        trace!(route = %sample.route, status = sample.status_code, "recording sample");
        self.inner.lock().record(sample, self.capacity);
    }

    /// Wipe all history and counters and restart the uptime clock.
    pub fn reset(&self) {
        *self.inner.lock() = Inner::new(self.capacity);
        debug!("metrics collector reset");
    }

    /// Produce a consistent point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().snapshot(self.capacity)
    }

    /// The last `limit` retained samples, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<SampleView> {
        let inner = self.inner.lock();
        let skip = inner.history.len().saturating_sub(limit);
        inner.history.iter().skip(skip).map(SampleView::from).collect()
    }

    /// Share of errored samples among those completed within the last
    /// `window_seconds`. Saturates at the retained window.
    pub fn error_rate(&self, window_seconds: u64) -> f64 {
        let cutoff = cutoff(window_seconds);
        let inner = self.inner.lock();
        let (count, errors) = inner
            .history
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .fold((0u64, 0u64), |(n, e), s| (n + 1, e + u64::from(s.error_occurred)));

        ratio(errors as f64, count)
    }

    /// Mean duration of samples completed within the last `window_seconds`.
    pub fn avg_duration(&self, window_seconds: u64) -> f64 {
        let cutoff = cutoff(window_seconds);
        let inner = self.inner.lock();
        let (count, sum) = inner
            .history
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .fold((0u64, 0.0), |(n, sum), s| (n + 1, sum + s.duration_ms));

        ratio(sum, count)
    }

    /// Per-endpoint figures over the retained window. Samples without an
    /// endpoint name are left out.
    pub fn endpoint_breakdown(&self) -> BTreeMap<String, EndpointStats> {
        let inner = self.inner.lock();
        let mut breakdown: BTreeMap<String, EndpointStats> = BTreeMap::new();

        for sample in &inner.history {
            let Some(endpoint) = &sample.endpoint else {
                continue;
            };
            let stats = breakdown
                .entry(endpoint.clone())
                .or_insert_with(|| EndpointStats {
                    request_count: 0,
                    average_response_time_ms: 0.0,
                    min_response_time_ms: f64::INFINITY,
                    max_response_time_ms: 0.0,
                    error_count: 0,
                    error_rate: 0.0,
                    status_codes: BTreeMap::new(),
                });

            stats.request_count += 1;
            // Running sum; divided once the scan is done
            stats.average_response_time_ms += sample.duration_ms;
            stats.min_response_time_ms = stats.min_response_time_ms.min(sample.duration_ms);
            stats.max_response_time_ms = stats.max_response_time_ms.max(sample.duration_ms);
            if sample.error_occurred {
                stats.error_count += 1;
            }
            *stats.status_codes.entry(sample.status_code).or_default() += 1;
        }
        drop(inner);

        for stats in breakdown.values_mut() {
            let n = stats.request_count as f64;
            stats.average_response_time_ms /= n;
            stats.error_rate = stats.error_count as f64 / n;
        }
        breakdown
    }

    /// Retained samples with `start <= timestamp <= end`, in insertion
    /// order. Periods that scrolled out of retention come back empty.
    pub fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Sample> {
        self.inner.lock().range(start, end)
    }

    /// Calendar rollup over `[start, end]`. Always returns a fully shaped
    /// value, zeroed when nothing matches.
    pub fn calendar_rollup(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> RollupView {
        // Copy the range out under one lock hold, aggregate without it
        let samples = self.range(start, end);
        debug!(
            %start,
            %end,
            matched = samples.len(),
            "computing calendar rollup"
        );
        RollupView::compute(start, end, &samples, &self.zone)
    }
}

fn cutoff(window_seconds: u64) -> DateTime<Utc> {
    let window = i64::try_from(window_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);
    Utc::now()
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn ratio(numerator: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        numerator / count as f64
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            total_requests: 0,
            total_errors: 0,
            status_codes: BTreeMap::new(),
            paths: FrequencyTable::new(),
            methods: BTreeMap::new(),
            endpoints: FrequencyTable::new(),
            error_types: BTreeMap::new(),
            latency_hist: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("static histogram bounds are valid"),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Stamps under the lock so the ring buffer stays in completion order
    /// when writers contend.
    fn record_now(&mut self, outcome: RequestOutcome, capacity: usize) {
        let sample = Sample::stamp(outcome, Utc::now());
        self.record(sample, capacity);
    }

    fn record(&mut self, sample: Sample, capacity: usize) {
        // ── Lifetime counters ───────────────────────────────────
        self.total_requests += 1;
        *self.status_codes.entry(sample.status_code).or_default() += 1;
        self.paths.increment(&sample.route);
        *self.methods.entry(sample.method.clone()).or_default() += 1;
        if let Some(endpoint) = &sample.endpoint {
            self.endpoints.increment(endpoint);
        }
        if sample.error_occurred {
            self.total_errors += 1;
            if let Some(kind) = &sample.error_kind {
                *self.error_types.entry(kind.clone()).or_default() += 1;
            }
        }

        // ── Histogram (clamp to the recordable range) ──────────
        let us = ((sample.duration_ms * 1_000.0).round() as u64).clamp(HIST_LOW, HIST_HIGH);
        let _ = self.latency_hist.record(us);

        // ── Ring buffer ─────────────────────────────────────────
        if self.history.len() == capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }

    fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Sample> {
        self.history
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .cloned()
            .collect()
    }

    /// Build a complete read-only snapshot.
    fn snapshot(&self, capacity: usize) -> MetricsSnapshot {
        let uptime_seconds = self.start_time.elapsed().as_secs_f64();

        let requests_per_second = if uptime_seconds > 0.0 {
            self.total_requests as f64 / uptime_seconds
        } else {
            0.0
        };
        let error_rate = ratio(self.total_errors as f64, self.total_requests);

        // Windowed figures come from the ring buffer only
        let mut durations: Vec<f64> = self.history.iter().map(|s| s.duration_ms).collect();
        durations.sort_by(f64::total_cmp);
        let n = durations.len() as u64;

        MetricsSnapshot {
            uptime_seconds,
            started_at: self.started_at,
            total_requests: self.total_requests,
            total_errors: self.total_errors,
            requests_per_second,
            error_rate,

            average_response_time_ms: ratio(durations.iter().sum(), n),
            min_response_time_ms: durations.first().copied().unwrap_or(0.0),
            max_response_time_ms: durations.last().copied().unwrap_or(0.0),
            response_time_percentiles: WindowPercentiles::from_sorted(&durations),
            recent_request_count: durations.len(),
            capacity,

            lifetime_latency: PercentileSet::from_histogram(&self.latency_hist),
            distribution: Self::compute_distribution(&self.latency_hist),

            status_codes: self.status_codes.clone(),
            top_paths: self.paths.top(TOP_N),
            top_methods: self.methods.clone(),
            top_endpoints: self.endpoints.top(TOP_N),
            error_types: self.error_types.clone(),
        }
    }

    // ── Lifetime distribution for the bar chart ────────────────

    /// Pre-defined bucket boundaries (μs). Covers typical web handler
    /// latencies from sub-millisecond to multi-second.
    const DIST_BOUNDARIES: &'static [u64] = &[
        1_000, 5_000, 10_000, 25_000, 50_000, 100_000, 250_000, 500_000, 1_000_000,
        2_500_000, 5_000_000, 10_000_000,
    ];

    fn compute_distribution(hist: &Histogram<u64>) -> Vec<DistBucket> {
        if hist.len() == 0 {
            return Vec::new();
        }

        let bounds = Self::DIST_BOUNDARIES;
        let num_buckets = bounds.len() + 1; // +1 for overflow
        let mut counts = vec![0u64; num_buckets];

        // Walk every recorded value in the histogram and bucket it
        for iv in hist.iter_recorded() {
            let val = iv.value_iterated_to();
            let idx = match bounds.binary_search(&val) {
                Ok(i) => i,
                Err(i) => i,
            };
            counts[idx.min(bounds.len())] += iv.count_at_value();
        }

        // Convert to output structs, skipping empty buckets
        let mut result = Vec::with_capacity(num_buckets);
        let mut prev = 0u64;
        for (i, &boundary) in bounds.iter().enumerate() {
            if counts[i] > 0 {
                result.push(DistBucket {
                    range_start_ms: prev as f64 / 1_000.0,
                    range_end_ms: boundary as f64 / 1_000.0,
                    count: counts[i],
                });
            }
            prev = boundary;
        }
        if counts[bounds.len()] > 0 {
            result.push(DistBucket {
                range_start_ms: prev as f64 / 1_000.0,
                range_end_ms: hist.max() as f64 / 1_000.0,
                count: counts[bounds.len()],
            });
        }

        result
    }
}

// ─── FrequencyTable impl ─────────────────────────────────────────

impl FrequencyTable {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    fn increment(&mut self, key: &str) {
        if let Some((count, _)) = self.entries.get_mut(key) {
            *count += 1;
            return;
        }
        self.entries.insert(key.to_string(), (1, self.next_seq));
        self.next_seq += 1;
    }

    /// Highest counts first, earlier first-seen winning ties.
    fn top(&self, n: usize) -> Vec<RankedCount> {
        let mut ranked: Vec<(&String, u64, u64)> = self
            .entries
            .iter()
            .map(|(name, &(count, seq))| (name, count, seq))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked
            .into_iter()
            .take(n)
            .map(|(name, count, _)| RankedCount {
                name: name.clone(),
                count,
            })
            .collect()
    }
}
