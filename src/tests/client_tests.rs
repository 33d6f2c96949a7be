// src/tests/client_tests.rs
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::support::{ok, status, Reply, ScriptedTransport};
use crate::client::{RemoteClient, RemoteRequest};
use crate::error::ProviderError;

fn client(transport: ScriptedTransport, timeout: Duration) -> RemoteClient {
    RemoteClient::new(Arc::new(transport), timeout)
}

fn shared_client(transport: &Arc<ScriptedTransport>, timeout: Duration) -> RemoteClient {
    RemoteClient::new(transport.clone(), timeout)
}

fn get(url: &str) -> RemoteRequest {
    RemoteRequest::get("test-provider", url)
}

#[tokio::test]
async fn decodes_successful_json() {
    let client = client(
        ScriptedTransport::new().route("/ok", ok(json!({"price": 10}))),
        Duration::from_secs(1),
    );
    let value = client.get_json(get("https://p.example/ok")).await.unwrap();
    assert_eq!(value["price"], json!(10));
}

#[tokio::test]
async fn failure_modes_are_distinguishable() {
    let client = client(
        ScriptedTransport::new()
            .route("/http", status(503))
            .route("/garbage", Reply::Raw(200, "<html>not json</html>".into()))
            .route("/down", Reply::Fail("connection refused".into())),
        Duration::from_secs(1),
    );

    match client.get_json(get("https://p.example/http")).await {
        Err(ProviderError::Http { status, provider }) => {
            assert_eq!(status, 503);
            assert_eq!(provider, "test-provider");
        }
        other => panic!("expected http error, got {other:?}"),
    }
    assert!(matches!(
        client.get_json(get("https://p.example/garbage")).await,
        Err(ProviderError::Decode { .. })
    ));
    assert!(matches!(
        client.get_json(get("https://p.example/down")).await,
        Err(ProviderError::Transport { .. })
    ));
}

#[tokio::test]
async fn timeout_resolves_near_the_configured_bound() {
    let client = client(
        ScriptedTransport::new().route(
            "/slow",
            Reply::Delay(Duration::from_secs(30), Box::new(ok(json!({})))),
        ),
        Duration::from_millis(50),
    );

    let started = Instant::now();
    let result = client.get_json(get("https://p.example/slow")).await;
    let elapsed = started.elapsed();

    match result {
        Err(ProviderError::Timeout { timeout_ms, .. }) => assert_eq!(timeout_ms, 50),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

#[tokio::test]
async fn timed_out_request_is_abandoned_not_left_running() {
    let transport = Arc::new(ScriptedTransport::new().route(
        "/slow",
        Reply::Delay(Duration::from_secs(30), Box::new(ok(json!({})))),
    ));
    let client = shared_client(&transport, Duration::from_millis(50));

    let result = client.get_json(get("https://p.example/slow")).await;

    assert!(matches!(result, Err(ProviderError::Timeout { .. })));
    assert_eq!(transport.abandoned(), 1, "in-flight request should be dropped on timeout");
}

#[tokio::test]
async fn completed_delay_is_not_counted_as_abandoned() {
    let transport = Arc::new(ScriptedTransport::new().route(
        "/slow",
        Reply::Delay(Duration::from_millis(10), Box::new(ok(json!({"late": true})))),
    ));
    let client = shared_client(&transport, Duration::from_secs(2));

    let value = client.get_json(get("https://p.example/slow")).await.unwrap();

    assert_eq!(value["late"], json!(true));
    assert_eq!(transport.abandoned(), 0);
}

#[tokio::test]
async fn per_request_timeout_overrides_the_default() {
    let client = client(
        ScriptedTransport::new().route(
            "/slow",
            Reply::Delay(Duration::from_millis(200), Box::new(ok(json!({"late": true})))),
        ),
        Duration::from_millis(20),
    );
    let request = get("https://p.example/slow").with_timeout(Duration::from_secs(5));
    let value = client.get_json(request).await.unwrap();
    assert_eq!(value["late"], json!(true));
}

#[test]
fn credentials_are_redacted_from_logged_urls() {
    let request = get("https://p.example/api?symbol=AAPL&apikey=secret&token=t");
    let redacted = request.redacted_url();
    assert!(!redacted.contains("secret"));
    assert!(!redacted.contains("token=t"));
    assert!(redacted.contains("symbol=AAPL"));
}
