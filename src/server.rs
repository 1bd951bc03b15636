use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::MonitorResult;
use crate::handlers;
use crate::metrics::stream;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Synthetic traffic ───────────────────────────────────
        .route("/test/normal", get(handlers::test_routes::normal))
        .route("/test/slow", get(handlers::test_routes::slow))
        .route("/test/error", get(handlers::test_routes::error))
        .route("/test/notfound", get(handlers::test_routes::not_found))
        .route(
            "/test/server-error",
            get(handlers::test_routes::server_error),
        )
        // ── Metrics ─────────────────────────────────────────────
        .route("/monitoring/stats", get(stream::get_stats))
        .route("/monitoring/stream", get(stream::stats_stream))
        .route("/monitoring/requests", get(stream::get_requests))
        .route("/monitoring/endpoints", get(stream::get_endpoints))
        .route("/monitoring/window", get(stream::get_window))
        // ── Reports ─────────────────────────────────────────────
        .route("/monitoring/report", get(handlers::reports::get_report))
        .route(
            "/monitoring/report/send",
            post(handlers::reports::send_report),
        )
        // ── Alerts ──────────────────────────────────────────────
        .route("/monitoring/alerts", get(handlers::alerts::list_alerts))
        .route(
            "/monitoring/alerts/unread-count",
            get(handlers::alerts::unread_count),
        )
        .route(
            "/monitoring/alerts/read-all",
            post(handlers::alerts::mark_all_read),
        )
        .route(
            "/monitoring/alerts/:id/read",
            post(handlers::alerts::mark_read),
        )
        // ── Health ──────────────────────────────────────────────
        .route("/health", get(handlers::health::health))
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            timing::timing_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
}

/// Serves the router on an already-bound listener until the server exits.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> MonitorResult<()> {
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
