//! Calendar-range rollups.
//!
//! Everything here works on a slice of samples that the collector already
//! copied out under its lock, so nothing in this module touches the lock.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use serde::Serialize;

use super::Sample;

/// How many groups `top_endpoints` keeps.
pub const TOP_ENDPOINTS: usize = 10;

/// Aggregate of every sample whose timestamp falls in `[start, end]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupView {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_requests: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub avg_response_time: f64,
    /// Highest count first; equal counts keep first-seen order.
    pub top_endpoints: Vec<EndpointRollup>,
    /// Errors by kind. Unclassified errors are not listed.
    pub error_breakdown: BTreeMap<String, u64>,
    pub status_code_distribution: BTreeMap<u16, u64>,
    /// Hour of day (0–23) in the rollup zone. Empty hours are absent.
    pub hourly_distribution: BTreeMap<u32, u64>,
    /// Day of week, Monday = 0. Empty days are absent.
    pub daily_distribution: BTreeMap<u32, u64>,
}

/// Per-group line in `top_endpoints`. Grouped by endpoint name, or by raw
/// route for samples without one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointRollup {
    pub endpoint: String,
    pub count: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub avg_duration: f64,
}

impl RollupView {
    /// Zero-valued rollup for a range with no traffic.
    pub fn empty(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start_date: start,
            end_date: end,
            total_requests: 0,
            total_errors: 0,
            error_rate: 0.0,
            avg_response_time: 0.0,
            top_endpoints: Vec::new(),
            error_breakdown: BTreeMap::new(),
            status_code_distribution: BTreeMap::new(),
            hourly_distribution: BTreeMap::new(),
            daily_distribution: BTreeMap::new(),
        }
    }

    /// Builds the rollup. `samples` should already be filtered to the range;
    /// hour and weekday bins are taken in `zone`.
    pub fn compute(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        samples: &[Sample],
        zone: &FixedOffset,
    ) -> Self {
        let mut view = Self::empty(start, end);
        if samples.is_empty() {
            return view;
        }

        let mut groups = GroupTable::default();
        let mut duration_sum = 0.0;

        for sample in samples {
            view.total_requests += 1;
            duration_sum += sample.duration_ms;
            if sample.error_occurred {
                view.total_errors += 1;
                if let Some(kind) = &sample.error_kind {
                    *view.error_breakdown.entry(kind.clone()).or_default() += 1;
                }
            }

            groups.add(sample);

            *view
                .status_code_distribution
                .entry(sample.status_code)
                .or_default() += 1;

            let local = sample.timestamp.with_timezone(zone);
            *view.hourly_distribution.entry(local.hour()).or_default() += 1;
            *view
                .daily_distribution
                .entry(local.weekday().num_days_from_monday())
                .or_default() += 1;
        }

        let total = view.total_requests as f64;
        view.error_rate = view.total_errors as f64 / total;
        view.avg_response_time = duration_sum / total;
        view.top_endpoints = groups.top(TOP_ENDPOINTS);
        view
    }
}

#[derive(Default)]
struct GroupAcc {
    name: String,
    count: u64,
    errors: u64,
    duration_sum: f64,
}

/// Groups in first-seen order, indexed by name.
#[derive(Default)]
struct GroupTable {
    index: HashMap<String, usize>,
    groups: Vec<GroupAcc>,
}

impl GroupTable {
    fn add(&mut self, sample: &Sample) {
        let name = sample.endpoint_or_route();
        let slot = match self.index.get(name) {
            Some(&slot) => slot,
            None => {
                self.index.insert(name.to_string(), self.groups.len());
                self.groups.push(GroupAcc {
                    name: name.to_string(),
                    ..GroupAcc::default()
                });
                self.groups.len() - 1
            }
        };

        let group = &mut self.groups[slot];
        group.count += 1;
        group.duration_sum += sample.duration_ms;
        if sample.error_occurred {
            group.errors += 1;
        }
    }

    fn top(mut self, n: usize) -> Vec<EndpointRollup> {
        // Stable sort keeps first-seen order among equal counts
        self.groups.sort_by(|a, b| b.count.cmp(&a.count));
        self.groups
            .into_iter()
            .take(n)
            .map(|g| EndpointRollup {
                error_rate: g.errors as f64 / g.count as f64,
                avg_duration: g.duration_sum / g.count as f64,
                endpoint: g.name,
                count: g.count,
                error_count: g.errors,
            })
            .collect()
    }
}
