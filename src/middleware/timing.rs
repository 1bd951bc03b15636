use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::alerts::AlertKind;
use crate::handlers::ErrorKind;
use crate::metrics::RequestOutcome;
use crate::AppState;

/// The SSE feed never completes in a meaningful time, so it is not sampled
const UNSAMPLED_PREFIX: &str = "/monitoring/stream";

/// Middleware that times every request and feeds the collector.
///
/// Adds two response headers:
///
///   X-Response-Time-Us  total handler wall time in microseconds
///   Server-Timing       same value in the standard Server-Timing format
///
/// A request counts as failed when the handler returned an `AppError`
/// (its kind comes from the `ErrorKind` extension) or the status is 5xx.
/// Only server-side failures (5xx) raise an alert and a webhook
/// notification; client errors are counted but stay quiet.
pub async fn timing_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_owned();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_owned());

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let us = elapsed.as_micros();
    let duration_ms = elapsed.as_secs_f64() * 1000.0;

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing = format!("total;dur={duration_ms:.3}");
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    if path.starts_with(UNSAMPLED_PREFIX) {
        return response;
    }

    // ── Classify and record ─────────────────────────────────────
    let status = response.status().as_u16();
    let error_kind = response
        .extensions()
        .get::<ErrorKind>()
        .map(|ErrorKind(kind)| kind.clone());
    let failed = error_kind.is_some() || status >= 500;

    debug!(%method, %path, status, us = us as u64, failed, "request completed");

    let mut outcome = RequestOutcome::new(path.clone(), method.clone(), status, duration_ms);
    if let Some(endpoint) = endpoint {
        outcome = outcome.endpoint(endpoint);
    }
    outcome = match (&error_kind, failed) {
        (Some(kind), _) => outcome.failed_with(kind.clone()),
        (None, true) => outcome.failed(),
        (None, false) => outcome,
    };
    state.metrics.record(outcome);

    if status >= 500 {
        raise_alert(&state, &method, &path, status, error_kind.as_deref());
    }

    response
}

fn raise_alert(state: &AppState, method: &str, path: &str, status: u16, kind: Option<&str>) {
    let mut details = HashMap::from([
        ("path".to_string(), json!(path)),
        ("method".to_string(), json!(method)),
        ("status_code".to_string(), json!(status)),
    ]);
    if let Some(kind) = kind {
        details.insert("error_type".to_string(), json!(kind));
    }

    let title = format!("Request failed: {}", kind.unwrap_or("unclassified error"));
    let message = format!("{method} {path} returned HTTP {status}");
    let alert = state.alerts.push(AlertKind::Error, title, message, details);
    state.notifier.notify_alert(&alert);
}
