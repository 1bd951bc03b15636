//! End-to-end tests against the demo host over real HTTP

use pretty_assertions::assert_eq;
use request_observatory::config::SmtpSettings;
use request_observatory::MonitorConfig;

use super::helpers::{get_json, hit, post_json, spawn_app, test_config};

#[tokio::test]
async fn normal_requests_are_sampled() {
    let (addr, state) = spawn_app(test_config()).await;

    for _ in 0..3 {
        assert_eq!(hit(addr, "/test/normal").await, 200);
    }

    let (status, stats) = get_json(addr, "/monitoring/stats").await;
    assert_eq!(status, 200);
    assert_eq!(stats["total_requests"], 3);
    assert_eq!(stats["total_errors"], 0);
    assert_eq!(stats["recent_request_count"], 3);
    assert_eq!(stats["capacity"], 100);
    assert_eq!(stats["status_codes"]["200"], 3);
    assert_eq!(stats["top_paths"][0]["name"], "/test/normal");
    assert_eq!(stats["top_paths"][0]["count"], 3);

    // the stats call itself is recorded after its snapshot was taken
    assert_eq!(state.metrics.snapshot().total_requests, 4);
}

#[tokio::test]
async fn raised_errors_are_classified_and_alerted() {
    let (addr, state) = spawn_app(test_config()).await;

    assert_eq!(hit(addr, "/test/normal").await, 200);
    assert_eq!(hit(addr, "/test/error").await, 500);

    let (_, stats) = get_json(addr, "/monitoring/stats").await;
    assert_eq!(stats["total_requests"], 2);
    assert_eq!(stats["total_errors"], 1);
    assert_eq!(stats["error_types"]["ValueError"], 1);
    assert_eq!(stats["error_rate"], 0.5);

    let alerts = state.alerts.list(10, false);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].detail_str("error_type"), Some("ValueError"));
    assert_eq!(alerts[0].detail_str("path"), Some("/test/error"));
    assert_eq!(alerts[0].detail_u64("status_code"), Some(500));
}

#[tokio::test]
async fn error_envelope_is_json() {
    let (addr, _state) = spawn_app(test_config()).await;

    let (status, body) = get_json(addr, "/test/notfound").await;
    assert_eq!(status, 404);
    assert_eq!(body["status"], 404);
    assert_eq!(body["error"], "nothing lives here");
}

#[tokio::test]
async fn endpoints_are_grouped_by_matched_route() {
    let (addr, _state) = spawn_app(test_config()).await;

    hit(addr, "/test/normal").await;
    hit(addr, "/test/normal").await;
    hit(addr, "/test/server-error").await;

    let (_, endpoints) = get_json(addr, "/monitoring/endpoints").await;
    assert_eq!(endpoints["/test/normal"]["request_count"], 2);
    assert_eq!(endpoints["/test/normal"]["error_count"], 0);
    assert_eq!(endpoints["/test/server-error"]["error_count"], 1);
    assert_eq!(endpoints["/test/server-error"]["status_codes"]["500"], 1);
}

#[tokio::test]
async fn recent_requests_respect_limit() {
    let (addr, _state) = spawn_app(test_config()).await;

    for _ in 0..5 {
        hit(addr, "/test/normal").await;
    }

    let (_, recent) = get_json(addr, "/monitoring/requests?limit=2").await;
    let recent = recent.as_array().unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0]["route"], "/test/normal");
    assert!(recent[0]["timestamp"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn window_stats_cover_recent_traffic() {
    let (addr, _state) = spawn_app(test_config()).await;

    hit(addr, "/test/normal").await;
    hit(addr, "/test/error").await;

    let (_, window) = get_json(addr, "/monitoring/window?seconds=300").await;
    assert_eq!(window["window_seconds"], 300);
    assert_eq!(window["error_rate"], 0.5);
}

#[tokio::test]
async fn health_degrades_with_error_rate() {
    let (addr, _state) = spawn_app(test_config()).await;

    let (status, body) = get_json(addr, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");

    hit(addr, "/test/error").await;

    // one failure out of two sampled requests
    let (_, body) = get_json(addr, "/health").await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["window_seconds"], 60);
}

#[tokio::test]
async fn alerts_can_be_marked_read() {
    let (addr, state) = spawn_app(test_config()).await;

    hit(addr, "/test/error").await;
    hit(addr, "/test/server-error").await;

    let (_, unread) = get_json(addr, "/monitoring/alerts/unread-count").await;
    assert_eq!(unread["unread"], 2);

    let (_, listed) = get_json(addr, "/monitoring/alerts?limit=1").await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["type"], "error");
    assert_eq!(listed[0]["read"], false);
    let newest = listed[0]["id"].as_str().unwrap().to_string();

    let (status, marked) = post_json(addr, &format!("/monitoring/alerts/{newest}/read")).await;
    assert_eq!(status, 200);
    assert_eq!(marked["marked"], 1);
    assert_eq!(state.alerts.unread_count(), 1);

    let (status, marked) = post_json(addr, "/monitoring/alerts/read-all").await;
    assert_eq!(status, 200);
    assert_eq!(marked["marked"], 1);
    assert_eq!(state.alerts.unread_count(), 0);
}

#[tokio::test]
async fn marking_unknown_alert_is_not_found() {
    let (addr, state) = spawn_app(test_config()).await;

    let (status, body) = post_json(addr, "/monitoring/alerts/alert_0_999/read").await;
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("alert_0_999"));

    // the failed lookup is counted as a classified error but raises no alert
    assert_eq!(state.metrics.snapshot().error_types.get("NotFound"), Some(&1));
    assert!(state.alerts.is_empty());
}

#[tokio::test]
async fn client_errors_do_not_raise_alerts() {
    let (addr, state) = spawn_app(test_config()).await;

    assert_eq!(hit(addr, "/test/notfound").await, 404);
    let (status, _) = get_json(
        addr,
        "/monitoring/report?start=2024-01-08T00:00:00Z&end=2024-01-01T00:00:00Z",
    )
    .await;
    assert_eq!(status, 400);
    assert!(state.alerts.is_empty());

    assert_eq!(hit(addr, "/test/server-error").await, 500);
    let alerts = state.alerts.list(10, false);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].detail_str("error_type"), Some("InternalServerError"));

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.total_errors, 3);
    assert_eq!(snapshot.error_types.get("BadRequest"), Some(&1));
}

#[tokio::test]
async fn report_renders_as_json_and_text() {
    let (addr, _state) = spawn_app(test_config()).await;

    hit(addr, "/test/normal").await;
    hit(addr, "/test/error").await;

    let (status, report) = get_json(addr, "/monitoring/report").await;
    assert_eq!(status, 200);
    assert_eq!(report["total_requests"], 2);
    assert_eq!(report["total_errors"], 1);
    assert_eq!(report["error_breakdown"]["ValueError"], 1);

    let text = reqwest::get(format!("http://{addr}/monitoring/report?format=text"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("ValueError"));
    assert!(text.contains("/test/normal"));
}

#[tokio::test]
async fn inverted_report_range_is_rejected() {
    let (addr, _state) = spawn_app(test_config()).await;

    let (status, body) = get_json(
        addr,
        "/monitoring/report?start=2024-01-08T00:00:00Z&end=2024-01-01T00:00:00Z",
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn report_send_without_webhook_is_not_dispatched() {
    let (addr, _state) = spawn_app(test_config()).await;

    let (status, body) = post_json(
        addr,
        "/monitoring/report/send?start=2024-01-01T00:00:00Z&end=2024-01-07T23:59:59Z",
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["dispatched"], false);
    assert_eq!(body["emailed"], false);
    assert_eq!(body["subject"], "Traffic report (2024-01-01 ~ 2024-01-07)");
}

#[tokio::test]
async fn report_send_hands_off_email_when_smtp_is_configured() {
    // No relay listens on this port; delivery fails in the background
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = MonitorConfig {
        smtp: Some(SmtpSettings {
            host: "127.0.0.1".into(),
            port,
            username: "reports@example.com".into(),
            password: "secret".into(),
            from: "reports@example.com".into(),
            recipients: vec!["ops@example.com".into()],
        }),
        ..test_config()
    };
    let (addr, _state) = spawn_app(config).await;

    let (status, body) = post_json(addr, "/monitoring/report/send").await;
    assert_eq!(status, 200);
    assert_eq!(body["emailed"], true);
    assert_eq!(body["dispatched"], false);

    // The host keeps serving after the failed delivery
    assert_eq!(hit(addr, "/test/normal").await, 200);
}

#[tokio::test]
async fn responses_carry_timing_headers() {
    let (addr, _state) = spawn_app(test_config()).await;

    let response = reqwest::get(format!("http://{addr}/test/normal")).await.unwrap();
    assert!(response.headers().contains_key("x-response-time-us"));
    let timing = response.headers()["server-timing"].to_str().unwrap();
    assert!(timing.starts_with("total;dur="));
}
