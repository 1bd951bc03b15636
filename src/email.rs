//! Emailed traffic reports over SMTP.
//!
//! Mirrors the webhook notifier: `send_report` spawns delivery on the
//! current tokio runtime and returns at once, and failures are logged.
//! Each email is `multipart/alternative` with the plain-text report and
//! its HTML rendering.

use std::sync::Arc;
use std::time::Duration;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::SmtpSettings;
use crate::error::{MonitorError, MonitorResult};
use crate::report::WeeklyReport;

const SMTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct EmailReporter {
    mailer: Option<Arc<Mailer>>,
}

struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailReporter {
    /// `settings` of `None` yields a disabled reporter that drops everything.
    /// Addresses are validated up front; nothing connects until a send.
    pub fn new(settings: Option<&SmtpSettings>) -> MonitorResult<Self> {
        let Some(settings) = settings else {
            return Ok(Self::disabled());
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        let recipients = settings
            .recipients
            .iter()
            .map(|addr| addr.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            mailer: Some(Arc::new(Mailer {
                transport,
                from: settings.from.parse()?,
                recipients,
            })),
        })
    }

    pub fn disabled() -> Self {
        Self { mailer: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Builds the email for `report`. `None` when disabled.
    pub fn compose(&self, report: &WeeklyReport) -> MonitorResult<Option<Message>> {
        let Some(mailer) = &self.mailer else {
            return Ok(None);
        };
        mailer.compose(report).map(Some)
    }

    /// Fire-and-forget delivery. `None` when disabled or outside a tokio
    /// runtime; the handle is only useful to tests.
    pub fn send_report(&self, report: &WeeklyReport) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime available, dropping report email");
            return None;
        };

        let reporter = self.clone();
        let report = report.clone();
        Some(runtime.spawn(async move {
            if let Err(e) = reporter.deliver(&report).await {
                log_failure(&e);
            }
        }))
    }

    /// Connect, authenticate and send one report, waiting for the relay.
    #[instrument(skip(self, report), fields(subject = %report.subject()))]
    pub async fn deliver(&self, report: &WeeklyReport) -> MonitorResult<()> {
        let Some(mailer) = &self.mailer else {
            return Ok(());
        };

        let email = mailer.compose(report)?;
        mailer.transport.send(email).await?;
        info!(recipients = mailer.recipients.len(), "report email delivered");
        Ok(())
    }
}

impl Mailer {
    fn compose(&self, report: &WeeklyReport) -> MonitorResult<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(report.subject());
        for to in &self.recipients {
            builder = builder.to(to.clone());
        }
        let body = MultiPart::alternative_plain_html(report.to_string(), report.to_html());
        Ok(builder.multipart(body)?)
    }
}

fn log_failure(err: &MonitorError) {
    match err {
        MonitorError::Smtp(smtp) if is_auth_rejection(smtp) => {
            error!("report email rejected at login: {smtp}");
            error!("check the SMTP username and password; some providers require an app password");
        }
        MonitorError::Smtp(smtp) => error!("SMTP delivery failed: {smtp}"),
        other => error!("report email failed: {other}"),
    }
}

/// 530/534/535: authentication required, too weak, or credentials invalid.
fn is_auth_rejection(err: &lettre::transport::smtp::Error) -> bool {
    err.status()
        .is_some_and(|code| matches!(code.to_string().as_str(), "530" | "534" | "535"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RollupView;
    use chrono::{TimeZone, Utc};

    fn settings(port: u16) -> SmtpSettings {
        SmtpSettings {
            host: "127.0.0.1".into(),
            port,
            username: "reports@example.com".into(),
            password: "secret".into(),
            from: "Reports <reports@example.com>".into(),
            recipients: vec!["ops@example.com".into(), "dev@example.com".into()],
        }
    }

    fn report() -> WeeklyReport {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 7, 23, 59, 59).unwrap();
        WeeklyReport::from(RollupView::empty(start, end))
    }

    #[test]
    fn disabled_reporter_composes_and_sends_nothing() {
        let reporter = EmailReporter::new(None).unwrap();
        assert!(!reporter.is_enabled());
        assert!(reporter.compose(&report()).unwrap().is_none());
        assert!(reporter.send_report(&report()).is_none());
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        let mut bad = settings(587);
        bad.recipients.push("not an address".into());
        assert!(matches!(
            EmailReporter::new(Some(&bad)),
            Err(MonitorError::EmailAddress(_))
        ));
    }

    #[test]
    fn email_carries_subject_recipients_and_both_parts() {
        let reporter = EmailReporter::new(Some(&settings(587))).unwrap();
        let email = reporter.compose(&report()).unwrap().unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("Subject: Traffic report (2024-01-01 ~ 2024-01-07)"));
        assert!(raw.contains("ops@example.com"));
        assert!(raw.contains("dev@example.com"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains("Content-Type: text/html"));
    }

    #[tokio::test]
    async fn unreachable_relay_fails_without_panicking() {
        // Bind then drop to get a local port nobody listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let reporter = EmailReporter::new(Some(&settings(port))).unwrap();

        let err = reporter.deliver(&report()).await.unwrap_err();
        assert!(matches!(err, MonitorError::Smtp(_)));

        // The background path logs the same failure and still completes
        let handle = reporter.send_report(&report()).unwrap();
        handle.await.unwrap();
    }
}
