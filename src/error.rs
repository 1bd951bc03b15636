use thiserror::Error;

/// Everything the observatory can fail on. Queries never fail; only
/// construction, configuration and outbound delivery do.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("{what} capacity must be greater than zero")]
    InvalidCapacity { what: &'static str },

    #[error("invalid value for {key}: {message}")]
    Config { key: String, message: String },

    #[error("webhook request failed: {0}")]
    Webhook(#[from] reqwest::Error),

    #[error("webhook rejected payload with HTTP {0}")]
    WebhookStatus(u16),

    #[error("invalid email address: {0}")]
    EmailAddress(#[from] lettre::address::AddressError),

    #[error("failed to build email: {0}")]
    EmailBuild(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
