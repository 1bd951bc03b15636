//! Synthetic routes for exercising the monitoring pipeline by hand.

use std::time::Duration;

use axum::Json;
use rand::Rng;
use serde::Serialize;

use super::AppError;

#[derive(Debug, Serialize)]
pub struct TestResponse {
    pub message: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<f64>,
}

// ─── GET /test/normal ────────────────────────────────────────────

pub async fn normal() -> Json<TestResponse> {
    Json(TestResponse {
        message: "request handled normally".into(),
        status: "success",
        delay_seconds: None,
    })
}

// ─── GET /test/slow ──────────────────────────────────────────────
/// Sleeps 1–3 s before answering.

pub async fn slow() -> Json<TestResponse> {
    let delay = rand::thread_rng().gen_range(1.0..3.0);
    tokio::time::sleep(Duration::from_secs_f64(delay)).await;

    Json(TestResponse {
        message: format!("slow request handled after {delay:.2}s"),
        status: "success",
        delay_seconds: Some(delay),
    })
}

// ─── GET /test/error ─────────────────────────────────────────────

pub async fn error() -> Result<Json<TestResponse>, AppError> {
    Err(AppError::Raised {
        kind: "ValueError".into(),
        message: "deliberate failure for monitoring".into(),
    })
}

// ─── GET /test/notfound ──────────────────────────────────────────

pub async fn not_found() -> Result<Json<TestResponse>, AppError> {
    Err(AppError::NotFound("nothing lives here".into()))
}

// ─── GET /test/server-error ──────────────────────────────────────

pub async fn server_error() -> Result<Json<TestResponse>, AppError> {
    Err(AppError::Internal("deliberate internal server error".into()))
}
