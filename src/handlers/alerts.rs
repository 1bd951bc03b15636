use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::alerts::Alert;
use crate::AppState;

use super::AppError;

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub unread_only: bool,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct MarkedResponse {
    pub marked: usize,
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub unread: usize,
}

// ─── GET /monitoring/alerts ──────────────────────────────────────

pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> Json<Vec<Alert>> {
    Json(state.alerts.list(query.limit, query.unread_only))
}

// ─── POST /monitoring/alerts/:id/read ────────────────────────────

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MarkedResponse>, AppError> {
    if state.alerts.mark_read(&id) {
        Ok(Json(MarkedResponse { marked: 1 }))
    } else {
        Err(AppError::NotFound(format!("alert '{id}' not found")))
    }
}

// ─── POST /monitoring/alerts/read-all ────────────────────────────

pub async fn mark_all_read(State(state): State<Arc<AppState>>) -> Json<MarkedResponse> {
    Json(MarkedResponse {
        marked: state.alerts.mark_all_read(),
    })
}

// ─── GET /monitoring/alerts/unread-count ─────────────────────────

pub async fn unread_count(State(state): State<Arc<AppState>>) -> Json<UnreadResponse> {
    Json(UnreadResponse {
        unread: state.alerts.unread_count(),
    })
}
