use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use tracing::{trace, warn};

use crate::error::{MonitorError, MonitorResult};

// ─── Defaults ────────────────────────────────────────────────────

pub const DEFAULT_MAX_HISTORY: usize = 1000;
pub const DEFAULT_MAX_ALERTS: usize = 50;
const DEFAULT_HEALTH_WINDOW_SECS: u64 = 60;
const DEFAULT_WARNING_ERROR_RATE: f64 = 0.05;
const DEFAULT_DEGRADED_ERROR_RATE: f64 = 0.10;
const DEFAULT_STREAM_INTERVAL_MS: u64 = 500;
const DEFAULT_SMTP_PORT: u16 = 587;

/// Runtime settings for the collector, the alert ledger and the demo host.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub bind_addr: SocketAddr,
    /// Ring buffer capacity of the metrics collector.
    pub max_history: usize,
    /// Ring buffer capacity of the alert ledger.
    pub max_alerts: usize,
    /// `None` disables the webhook notifier.
    pub webhook_url: Option<String>,
    /// Zone used for hour-of-day / day-of-week bins in calendar rollups.
    pub utc_offset: FixedOffset,
    pub health: HealthThresholds,
    pub stream_interval_ms: u64,
    /// `None` disables emailed reports.
    pub smtp: Option<SmtpSettings>,
}

/// SMTP relay used to email traffic reports. Connections upgrade with
/// STARTTLS before authenticating.
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; defaults to `username`.
    pub from: String,
    pub recipients: Vec<String>,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("recipients", &self.recipients)
            .finish()
    }
}

/// Error-rate thresholds for the `/health` probe.
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub window_secs: u64,
    pub warning_error_rate: f64,
    pub degraded_error_rate: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_HEALTH_WINDOW_SECS,
            warning_error_rate: DEFAULT_WARNING_ERROR_RATE,
            degraded_error_rate: DEFAULT_DEGRADED_ERROR_RATE,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_history: DEFAULT_MAX_HISTORY,
            max_alerts: DEFAULT_MAX_ALERTS,
            webhook_url: None,
            utc_offset: Utc.fix(),
            health: HealthThresholds::default(),
            stream_interval_ms: DEFAULT_STREAM_INTERVAL_MS,
            smtp: None,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

impl MonitorConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> MonitorResult<Self> {
        if dotenv::dotenv().is_err() {
            trace!("no .env file found, using process environment only");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Missing keys fall back
    /// to defaults, unparseable ones are rejected.
    pub fn from_lookup<F>(lookup: F) -> MonitorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse_or(&lookup, "MONITOR_BIND_ADDR", default_bind_addr())?;
        let max_history = parse_or(&lookup, "MONITOR_MAX_HISTORY", DEFAULT_MAX_HISTORY)?;
        let max_alerts = parse_or(&lookup, "MONITOR_MAX_ALERTS", DEFAULT_MAX_ALERTS)?;

        if max_history == 0 {
            return Err(MonitorError::InvalidCapacity { what: "history" });
        }
        if max_alerts == 0 {
            return Err(MonitorError::InvalidCapacity { what: "alert" });
        }

        let webhook_url = lookup("MONITOR_WEBHOOK_URL").filter(|url| !url.trim().is_empty());
        if webhook_url.is_none() {
            warn!("MONITOR_WEBHOOK_URL not set, webhook notifications disabled");
        }

        let offset_minutes: i32 = parse_or(&lookup, "MONITOR_UTC_OFFSET_MINUTES", 0)?;
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| MonitorError::Config {
                key: "MONITOR_UTC_OFFSET_MINUTES".into(),
                message: format!("{offset_minutes} minutes is out of range"),
            })?;

        let health = HealthThresholds {
            window_secs: parse_or(
                &lookup,
                "MONITOR_HEALTH_WINDOW_SECS",
                DEFAULT_HEALTH_WINDOW_SECS,
            )?,
            warning_error_rate: parse_or(
                &lookup,
                "MONITOR_WARNING_ERROR_RATE",
                DEFAULT_WARNING_ERROR_RATE,
            )?,
            degraded_error_rate: parse_or(
                &lookup,
                "MONITOR_DEGRADED_ERROR_RATE",
                DEFAULT_DEGRADED_ERROR_RATE,
            )?,
        };

        let stream_interval_ms = parse_or(
            &lookup,
            "MONITOR_STREAM_INTERVAL_MS",
            DEFAULT_STREAM_INTERVAL_MS,
        )?;
        if stream_interval_ms == 0 {
            return Err(MonitorError::Config {
                key: "MONITOR_STREAM_INTERVAL_MS".into(),
                message: "interval must be greater than zero".into(),
            });
        }

        let smtp = smtp_from_lookup(&lookup)?;
        if smtp.is_none() {
            warn!("MONITOR_SMTP_HOST not set, emailed reports disabled");
        }

        let config = Self {
            bind_addr,
            max_history,
            max_alerts,
            webhook_url,
            utc_offset,
            health,
            stream_interval_ms,
            smtp,
        };
        trace!("loaded config: {config:?}");
        Ok(config)
    }
}

fn smtp_from_lookup<F>(lookup: &F) -> MonitorResult<Option<SmtpSettings>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(host) = non_blank(lookup, "MONITOR_SMTP_HOST") else {
        return Ok(None);
    };

    let required = |key: &str| {
        non_blank(lookup, key).ok_or_else(|| MonitorError::Config {
            key: key.to_string(),
            message: "required when MONITOR_SMTP_HOST is set".into(),
        })
    };
    let username = required("MONITOR_SMTP_USERNAME")?;
    let password = required("MONITOR_SMTP_PASSWORD")?;
    let recipients: Vec<String> = required("MONITOR_SMTP_RECIPIENTS")?
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect();
    if recipients.is_empty() {
        return Err(MonitorError::Config {
            key: "MONITOR_SMTP_RECIPIENTS".into(),
            message: "no recipient addresses".into(),
        });
    }

    Ok(Some(SmtpSettings {
        port: parse_or(lookup, "MONITOR_SMTP_PORT", DEFAULT_SMTP_PORT)?,
        from: non_blank(lookup, "MONITOR_SMTP_FROM").unwrap_or_else(|| username.clone()),
        host,
        username,
        password,
        recipients,
    }))
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> MonitorResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| MonitorError::Config {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}
