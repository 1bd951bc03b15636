pub mod collector;
pub mod percentiles;
pub mod rollup;
pub mod stream;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use collector::{EndpointStats, MetricsCollector, MetricsSnapshot, RankedCount};
pub use percentiles::{PercentileSet, WindowPercentiles};
pub use rollup::{EndpointRollup, RollupView};

/// Outcome of one completed request as reported by the host.
/// This is the "write" side: the host builds these and pushes them in;
/// the collector stamps them into a [`Sample`].
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// Raw request path, e.g. "/api/users/42"
    pub route: String,
    pub method: String,
    pub status_code: u16,
    /// Handler wall time in milliseconds
    pub duration_ms: f64,
    pub error_occurred: bool,
    /// Only meaningful when `error_occurred` is set
    pub error_kind: Option<String>,
    /// Logical endpoint name, e.g. "/api/users/:id"
    pub endpoint: Option<String>,
}

impl RequestOutcome {
    pub fn new(
        route: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
        duration_ms: f64,
    ) -> Self {
        Self {
            route: route.into(),
            method: method.into(),
            status_code,
            duration_ms,
            error_occurred: false,
            error_kind: None,
            endpoint: None,
        }
    }

    /// Marks the outcome as failed without a kind (unclassified).
    pub fn failed(mut self) -> Self {
        self.error_occurred = true;
        self
    }

    pub fn failed_with(mut self, kind: impl Into<String>) -> Self {
        self.error_occurred = true;
        self.error_kind = Some(kind.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// A recorded request outcome. Immutable once stored in the ring buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub route: String,
    pub method: String,
    pub status_code: u16,
    pub duration_ms: f64,
    pub error_occurred: bool,
    pub error_kind: Option<String>,
    pub endpoint: Option<String>,
}

impl Sample {
    pub(crate) fn stamp(outcome: RequestOutcome, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            route: outcome.route,
            method: outcome.method,
            status_code: outcome.status_code,
            // Negative and NaN durations are clamped to zero
            duration_ms: outcome.duration_ms.max(0.0),
            error_occurred: outcome.error_occurred,
            error_kind: outcome.error_kind,
            endpoint: outcome.endpoint,
        }
    }

    /// Endpoint name, falling back to the raw route.
    pub fn endpoint_or_route(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.route)
    }
}

/// A single entry in the recent-requests feed.
#[derive(Debug, Clone, Serialize)]
pub struct SampleView {
    /// Unix seconds, fractional
    pub timestamp: f64,
    /// ISO-8601 rendering of `timestamp`
    pub datetime: String,
    pub route: String,
    pub method: String,
    pub status_code: u16,
    pub duration_ms: f64,
    pub error_occurred: bool,
    pub error_kind: Option<String>,
    pub endpoint: Option<String>,
}

impl From<&Sample> for SampleView {
    fn from(sample: &Sample) -> Self {
        Self {
            timestamp: sample.timestamp.timestamp_micros() as f64 / 1_000_000.0,
            datetime: sample.timestamp.to_rfc3339(),
            route: sample.route.clone(),
            method: sample.method.clone(),
            status_code: sample.status_code,
            duration_ms: sample.duration_ms,
            error_occurred: sample.error_occurred,
            error_kind: sample.error_kind.clone(),
            endpoint: sample.endpoint.clone(),
        }
    }
}
