use std::sync::Arc;

use request_observatory::{server, AppState, MonitorConfig, MonitorResult};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "request_observatory=debug,tower_http=info";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> MonitorResult<()> {
    init_tracing();

    // ── 1. Load configuration ────────────────────────────────────
    let config = MonitorConfig::from_env()?;
    info!(
        max_history = config.max_history,
        max_alerts = config.max_alerts,
        webhook = config.webhook_url.is_some(),
        email = config.smtp.is_some(),
        "request observatory starting"
    );

    // ── 2. Build shared state ────────────────────────────────────
    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState::new(config)?);

    // ── 3. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("stats     → http://{bind_addr}/monitoring/stats");
    info!("stream    → http://{bind_addr}/monitoring/stream");
    info!("report    → http://{bind_addr}/monitoring/report?format=text");

    server::serve(listener, state).await
}
