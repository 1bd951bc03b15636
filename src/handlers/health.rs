use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::HealthThresholds;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Degraded,
}

impl HealthStatus {
    /// Classify a windowed error rate. Both thresholds are exclusive.
    pub fn from_error_rate(error_rate: f64, thresholds: &HealthThresholds) -> Self {
        if error_rate > thresholds.degraded_error_rate {
            Self::Degraded
        } else if error_rate > thresholds.warning_error_rate {
            Self::Warning
        } else {
            Self::Healthy
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub uptime_seconds: f64,
    pub error_rate: f64,
    pub window_seconds: u64,
}

// ─── GET /health ─────────────────────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let thresholds = state.config.health;
    let error_rate = state.metrics.error_rate(thresholds.window_secs);

    Json(HealthResponse {
        status: HealthStatus::from_error_rate(error_rate, &thresholds),
        uptime_seconds: state.metrics.snapshot().uptime_seconds,
        error_rate,
        window_seconds: thresholds.window_secs,
    })
}
