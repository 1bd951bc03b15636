use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;

use super::AppError;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// RFC 3339; defaults to seven days before `end`
    pub start: Option<DateTime<Utc>>,
    /// RFC 3339; defaults to now
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub format: ReportFormat,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    /// Handed to the webhook notifier
    pub dispatched: bool,
    /// Handed to the SMTP reporter
    pub emailed: bool,
    pub subject: String,
}

impl ReportQuery {
    fn range(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
        let end = self.end.unwrap_or_else(Utc::now);
        let start = self.start.unwrap_or(end - Duration::days(7));
        if start > end {
            return Err(AppError::BadRequest("start must not be after end".into()));
        }
        Ok((start, end))
    }
}

// ─── GET /monitoring/report ──────────────────────────────────────

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    let (start, end) = query.range()?;
    let report = state.reports.build(start, end);

    Ok(match query.format {
        ReportFormat::Json => Json(report).into_response(),
        ReportFormat::Text => report.to_string().into_response(),
    })
}

// ─── POST /monitoring/report/send ────────────────────────────────
/// Builds the report and hands it to the webhook notifier and the SMTP
/// reporter without waiting for either.

pub async fn send_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<DispatchResponse>, AppError> {
    let (start, end) = query.range()?;
    let report = state.reports.build(start, end);
    let dispatched = state.notifier.notify_report(&report).is_some();
    let emailed = state.mailer.send_report(&report).is_some();

    Ok(Json(DispatchResponse {
        dispatched,
        emailed,
        subject: report.subject(),
    }))
}
