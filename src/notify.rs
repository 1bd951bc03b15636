//! Outbound webhook notifications (Discord-compatible embed payloads).
//!
//! Delivery is fire-and-forget: `notify_*` spawns the POST on the current
//! tokio runtime and returns immediately, so a slow or failing webhook never
//! holds up request handling. Transport failures are logged, not returned.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::alerts::{Alert, AlertKind};
use crate::error::{MonitorError, MonitorResult};
use crate::report::WeeklyReport;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("request-observatory/", env!("CARGO_PKG_VERSION"));

const COLOR_RED: u32 = 15158332;
const COLOR_YELLOW: u32 = 16776960;
const COLOR_GREEN: u32 = 3066993;
const COLOR_BLUE: u32 = 5793266;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn inline(name: &str, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            inline: true,
        }
    }
}

impl From<Embed> for Message {
    fn from(embed: Embed) -> Self {
        Message {
            content: None,
            embeds: vec![embed],
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: Option<String>,
}

impl WebhookNotifier {
    /// `url` of `None` yields a disabled notifier that drops everything.
    pub fn new(url: Option<String>) -> MonitorResult<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, url })
    }

    pub fn disabled() -> MonitorResult<Self> {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    pub fn build_alert_embed(alert: &Alert) -> Embed {
        let status = alert.detail_u64("status_code");
        let color = match (alert.kind, status) {
            (_, Some(code)) if code >= 500 => COLOR_RED,
            (AlertKind::Info, _) => COLOR_BLUE,
            _ => COLOR_YELLOW,
        };

        let mut fields = Vec::new();
        if let Some(path) = alert.detail_str("path") {
            fields.push(EmbedField::inline("Path", path));
        }
        if let Some(code) = status {
            fields.push(EmbedField::inline("Status code", code));
        }
        if let Some(kind) = alert.detail_str("error_type") {
            fields.push(EmbedField::inline("Error type", kind));
        }

        Embed {
            title: alert.title.clone(),
            description: alert.message.clone(),
            color,
            fields,
            timestamp: Some(alert.timestamp.to_rfc3339()),
        }
    }

    pub fn build_report_embed(report: &WeeklyReport) -> Embed {
        let color = if report.is_error_rate_high() {
            COLOR_RED
        } else {
            COLOR_GREEN
        };

        let mut fields = vec![
            EmbedField::inline("Requests", report.total_requests),
            EmbedField::inline("Errors", report.total_errors),
            EmbedField::inline("Error rate", format!("{:.2}%", report.error_rate * 100.0)),
            EmbedField::inline("Avg response", format!("{:.2}ms", report.avg_response_time)),
        ];
        if let Some(top) = report.top_endpoints.first() {
            fields.push(EmbedField {
                name: "Busiest endpoint".to_string(),
                value: format!("{} ({} requests)", top.endpoint, top.count),
                inline: false,
            });
        }

        Embed {
            title: report.subject(),
            description: format!("```\n{report}```"),
            color,
            fields,
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    /// Fire-and-forget alert delivery. `None` when disabled or when called
    /// outside a tokio runtime; the handle is only useful to tests.
    pub fn notify_alert(&self, alert: &Alert) -> Option<JoinHandle<()>> {
        self.dispatch(Self::build_alert_embed(alert).into())
    }

    /// Fire-and-forget report delivery.
    pub fn notify_report(&self, report: &WeeklyReport) -> Option<JoinHandle<()>> {
        self.dispatch(Self::build_report_embed(report).into())
    }

    fn dispatch(&self, message: Message) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime available, dropping webhook notification");
            return None;
        };

        let notifier = self.clone();
        Some(runtime.spawn(async move {
            if let Err(e) = notifier.deliver(&message).await {
                error!("webhook notification failed: {e}");
            }
        }))
    }

    /// POST one message and wait for the response.
    #[instrument(skip(self, message))]
    pub async fn deliver(&self, message: &Message) -> MonitorResult<()> {
        let Some(url) = &self.url else {
            return Ok(());
        };

        let response = self.client.post(url).json(message).send().await?;
        let status = response.status();
        if status.is_success() {
            info!("webhook notification delivered");
            return Ok(());
        }

        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("webhook token is invalid or expired, regenerate the webhook URL")
            }
            StatusCode::FORBIDDEN => {
                warn!("webhook URL lacks permission, prefer a webhook created from channel settings")
            }
            StatusCode::NOT_FOUND => {
                warn!("webhook was deleted or the URL is wrong")
            }
            _ => {
                if let Ok(body) = response.text().await {
                    warn!("webhook error response: {body}");
                }
            }
        }
        Err(MonitorError::WebhookStatus(status.as_u16()))
    }
}
