//! Shared helpers for integration tests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use request_observatory::{server, AppState, MonitorConfig};
use serde_json::Value;

pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        max_history: 100,
        max_alerts: 20,
        ..MonitorConfig::default()
    }
}

/// Starts the demo host on a random port and returns its address plus the
/// shared state for direct inspection.
pub async fn spawn_app(config: MonitorConfig) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new(config).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(server::serve(listener, state.clone()));
    (addr, state)
}

pub async fn get_json(addr: SocketAddr, path: &str) -> (u16, Value) {
    let response = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

pub async fn post_json(addr: SocketAddr, path: &str) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

pub async fn hit(addr: SocketAddr, path: &str) -> u16 {
    reqwest::get(format!("http://{addr}{path}"))
        .await
        .unwrap()
        .status()
        .as_u16()
}

/// Polls `check` until it returns true or the timeout elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
