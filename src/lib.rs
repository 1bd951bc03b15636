//! In-process request telemetry: a bounded, thread-safe history of request
//! samples with lifetime counters, windowed and calendar-range queries, an
//! alert ledger, traffic reports, webhook delivery and emailed reports.

use std::sync::Arc;

pub mod alerts;
pub mod config;
pub mod email;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod notify;
pub mod report;
pub mod server;

pub use alerts::{Alert, AlertKind, AlertLedger};
pub use config::MonitorConfig;
pub use email::EmailReporter;
pub use error::{MonitorError, MonitorResult};
pub use metrics::{MetricsCollector, MetricsSnapshot, RequestOutcome, Sample, SampleView};
pub use notify::WebhookNotifier;
pub use report::{ReportBuilder, WeeklyReport};

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Central metrics engine. The timing middleware pushes samples,
    /// stats endpoints read snapshots.
    pub metrics: Arc<MetricsCollector>,

    /// Dashboard alerts raised for failed requests.
    pub alerts: Arc<AlertLedger>,

    /// Outbound webhook; a no-op when no URL is configured.
    pub notifier: WebhookNotifier,

    /// SMTP report delivery; a no-op when no relay is configured.
    pub mailer: EmailReporter,

    pub reports: ReportBuilder,

    pub config: MonitorConfig,
}

impl AppState {
    pub fn new(config: MonitorConfig) -> MonitorResult<Self> {
        let metrics = Arc::new(MetricsCollector::with_zone(
            config.max_history,
            config.utc_offset,
        )?);
        Ok(Self {
            alerts: Arc::new(AlertLedger::new(config.max_alerts)?),
            notifier: WebhookNotifier::new(config.webhook_url.clone())?,
            mailer: EmailReporter::new(config.smtp.as_ref())?,
            reports: ReportBuilder::new(metrics.clone()),
            metrics,
            config,
        })
    }
}
