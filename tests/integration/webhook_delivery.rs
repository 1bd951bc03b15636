//! Webhook notifier tests against a mock webhook endpoint

use std::collections::HashMap;
use std::time::Duration;

use request_observatory::alerts::{AlertKind, AlertLedger};
use request_observatory::notify::{Embed, Message};
use request_observatory::{MonitorConfig, MonitorError, WebhookNotifier};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::{eventually, hit, spawn_app};

fn plain_message() -> Message {
    Embed {
        title: "hello".into(),
        description: "from the tests".into(),
        color: 0,
        fields: Vec::new(),
        timestamp: None,
    }
    .into()
}

#[tokio::test]
async fn deliver_posts_embed_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({ "embeds": [{ "title": "hello" }] })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(Some(format!("{}/hook", server.uri()))).unwrap();
    notifier.deliver(&plain_message()).await.unwrap();
}

#[tokio::test]
async fn rejected_delivery_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(Some(server.uri())).unwrap();
    let err = notifier.deliver(&plain_message()).await.unwrap_err();
    assert!(matches!(err, MonitorError::WebhookStatus(401)));
}

#[tokio::test]
async fn notify_alert_runs_in_background() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "embeds": [{ "color": 15158332 }] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = AlertLedger::new(4).unwrap();
    let alert = ledger.push(
        AlertKind::Error,
        "Request failed: ValueError".into(),
        "GET /test/error returned HTTP 500".into(),
        HashMap::from([("status_code".to_string(), json!(500))]),
    );

    let notifier = WebhookNotifier::new(Some(server.uri())).unwrap();
    let handle = notifier.notify_alert(&alert).expect("notifier is enabled");
    handle.await.unwrap();
}

#[tokio::test]
async fn disabled_notifier_spawns_nothing() {
    let ledger = AlertLedger::new(4).unwrap();
    let alert = ledger.push(AlertKind::Info, "t".into(), "m".into(), HashMap::new());

    let notifier = WebhookNotifier::disabled().unwrap();
    assert!(!notifier.is_enabled());
    assert!(notifier.notify_alert(&alert).is_none());
    notifier.deliver(&plain_message()).await.unwrap();
}

#[tokio::test]
async fn failed_requests_reach_the_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alerts"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let config = MonitorConfig {
        webhook_url: Some(format!("{}/alerts", server.uri())),
        ..super::helpers::test_config()
    };
    let (addr, _state) = spawn_app(config).await;

    assert_eq!(hit(addr, "/test/error").await, 500);

    let mock = &server;
    let delivered = eventually(Duration::from_secs(5), move || async move {
        mock.received_requests()
            .await
            .is_some_and(|requests| !requests.is_empty())
    })
    .await;
    assert!(delivered, "webhook never received the alert");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["embeds"][0]["title"], "Request failed: ValueError");
}

#[tokio::test]
async fn report_send_dispatches_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let config = MonitorConfig {
        webhook_url: Some(server.uri()),
        ..super::helpers::test_config()
    };
    let (addr, _state) = spawn_app(config).await;

    let (status, body) = super::helpers::post_json(addr, "/monitoring/report/send").await;
    assert_eq!(status, 200);
    assert_eq!(body["dispatched"], true);
}
