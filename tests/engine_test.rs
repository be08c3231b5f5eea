//! End-to-end tests of the traffic engine against local mock backends.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tower::ServiceExt;
use url::Url;

use zombie::config::TargetConfig;
use zombie::http::transport::CLIENT_TIMEOUT;
use zombie::http::{instrumented, PingRequest, ReqwestTransport};
use zombie::lifecycle::Shutdown;
use zombie::observability::metrics::{sample_value, IN_FLIGHT_REQUESTS, REQUESTS_TOTAL};
use zombie::observability::{ClientMetrics, MetricsRegistry};
use zombie::traffic::{resolve_targets, TrafficEngine};

fn client_metrics() -> ClientMetrics {
    let registry = MetricsRegistry::new(ClientMetrics::HISTOGRAM_BUCKETS).unwrap();
    ClientMetrics::register(&registry).unwrap()
}

#[tokio::test]
async fn test_cancellation_stops_workers() {
    let (addr, _seen) = common::start_mock_backend(200, "ok").await;

    let mut target = TargetConfig::new(format!("http://{}/", addr));
    target.workers = 3;
    target.delay = 100;
    target.jitter = 0.0;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = TrafficEngine::new(resolve_targets(&[target]).unwrap(), client_metrics(), tx);

    let shutdown = Shutdown::new();
    let mut running = engine.start(&shutdown).unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    shutdown.trigger();
    running.join().await;

    let mut per_worker: HashMap<usize, usize> = HashMap::new();
    while let Ok(result) = rx.try_recv() {
        assert_eq!(result.status, Some(200));
        *per_worker.entry(result.worker).or_default() += 1;
    }
    assert_eq!(per_worker.len(), 3);
    for (worker, count) in &per_worker {
        assert!((1..=3).contains(count), "worker {} pinged {} times", worker, count);
    }

    // The engine still holds a sender, so an empty channel means nobody sent.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err());
    drop(engine);
}

#[tokio::test]
async fn test_unnamed_target_uses_url_and_single_worker() {
    let (addr, _seen) = common::start_mock_backend(200, "ok").await;
    let url = format!("http://{}/health", addr);

    let mut target = TargetConfig::new(url.clone());
    target.workers = -3;
    target.delay = 10;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = TrafficEngine::new(resolve_targets(&[target]).unwrap(), client_metrics(), tx);

    let shutdown = Shutdown::new();
    let mut running = engine.start(&shutdown).unwrap();
    assert_eq!(running.worker_count(), 1);

    let result = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    shutdown.trigger();
    running.join().await;

    assert_eq!(result.name, url);
    assert_eq!(result.url, url);
    assert_eq!(result.worker, 0);
    assert_eq!(result.method, "GET");
}

#[tokio::test]
async fn test_five_gets_are_counted() {
    let (addr, seen) = common::start_mock_backend(200, "hello").await;
    let metrics = client_metrics();
    let transport = ReqwestTransport::for_target("local", &metrics, CLIENT_TIMEOUT).unwrap();
    let service = instrumented("local", &metrics, transport);
    let url = Url::parse(&format!("http://{}/", addr)).unwrap();

    for _ in 0..5 {
        let response = service.clone().oneshot(PingRequest::get(url.clone())).await.unwrap();
        assert_eq!(response.status.as_u16(), 200);
        assert_eq!(response.body_len, 5);
    }

    let rendered = metrics.registry().render();
    assert_eq!(
        sample_value(&rendered, REQUESTS_TOTAL, &[("target", "local"), ("code", "200"), ("method", "GET")]),
        Some(5.0)
    );
    assert_eq!(sample_value(&rendered, IN_FLIGHT_REQUESTS, &[("target", "local")]), Some(0.0));
    assert_eq!(seen.count(), 5);
}

#[tokio::test]
async fn test_error_statuses_are_counted() {
    let (addr, _seen) = common::start_mock_backend(503, "unavailable").await;
    let metrics = client_metrics();
    let transport = ReqwestTransport::for_target("flaky", &metrics, CLIENT_TIMEOUT).unwrap();
    let service = instrumented("flaky", &metrics, transport);
    let url = Url::parse(&format!("http://{}/", addr)).unwrap();

    let response = service.oneshot(PingRequest::get(url)).await.unwrap();
    assert_eq!(response.status.as_u16(), 503);

    let rendered = metrics.registry().render();
    assert_eq!(
        sample_value(&rendered, REQUESTS_TOTAL, &[("target", "flaky"), ("code", "503")]),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_unreachable_target_keeps_pinging() {
    let addr = common::closed_port().await;
    let mut target = TargetConfig::new(format!("http://{}/", addr));
    target.name = Some("down".into());
    target.delay = 10;

    let metrics = client_metrics();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = TrafficEngine::new(resolve_targets(&[target]).unwrap(), metrics.clone(), tx);

    let shutdown = Shutdown::new();
    let mut running = engine.start(&shutdown).unwrap();
    for _ in 0..3 {
        let result = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.status, None);
        assert_eq!(result.name, "down");
    }
    shutdown.trigger();
    running.join().await;

    let rendered = metrics.registry().render();
    assert_eq!(sample_value(&rendered, REQUESTS_TOTAL, &[("target", "down")]), None);
    assert_eq!(sample_value(&rendered, IN_FLIGHT_REQUESTS, &[("target", "down")]), Some(0.0));
}
