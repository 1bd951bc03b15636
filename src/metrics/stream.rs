use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::warn;

use super::collector::{EndpointStats, MetricsSnapshot};
use super::SampleView;
use crate::AppState;

// ─── GET /monitoring/stats ───────────────────────────────────────
/// Returns a single JSON snapshot.

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

// ─── GET /monitoring/stream ──────────────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes a full `MetricsSnapshot` as JSON on every configured tick.

pub async fn stats_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(Duration::from_millis(state.config.stream_interval_ms));

    let stream = IntervalStream::new(interval).map(move |_| {
        let snapshot = state.metrics.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap_or_else(|e| {
            warn!("failed to serialize snapshot: {e}");
            String::new()
        });
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// ─── GET /monitoring/requests ────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    pub limit: usize,
}

fn default_recent_limit() -> usize {
    100
}

pub async fn get_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<SampleView>> {
    Json(state.metrics.recent(query.limit))
}

// ─── GET /monitoring/endpoints ───────────────────────────────────

pub async fn get_endpoints(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, EndpointStats>> {
    Json(state.metrics.endpoint_breakdown())
}

// ─── GET /monitoring/window ──────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    #[serde(default = "default_window")]
    pub seconds: u64,
}

fn default_window() -> u64 {
    60
}

#[derive(Debug, Serialize)]
pub struct WindowStats {
    pub window_seconds: u64,
    pub error_rate: f64,
    pub avg_duration_ms: f64,
}

pub async fn get_window(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> Json<WindowStats> {
    Json(WindowStats {
        window_seconds: query.seconds,
        error_rate: state.metrics.error_rate(query.seconds),
        avg_duration_ms: state.metrics.avg_duration(query.seconds),
    })
}
