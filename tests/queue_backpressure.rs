//! Bounded queue behavior over HTTP.

use std::time::Duration;

use axum::http::StatusCode;
use futures_util::future::join_all;
use overload_guard::config::StrategyKind;
use serde_json::Value;

mod common;

fn queue_config(latency_ms: u64) -> overload_guard::GuardConfig {
    let mut config = common::fast_config();
    config.strategy = StrategyKind::Queue;
    config.backend.latency_ms = latency_ms;
    config.queue.capacity = 10;
    config.queue.workers = 1;
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_beyond_capacity_is_rejected() {
    let (addr, shutdown) = common::start_guard(queue_config(400)).await;
    let client = common::client();
    let url = format!("http://{}/", addr);

    let responses = join_all((0..12).map(|_| client.get(&url).send())).await;

    let mut ok = 0;
    let mut rejected = 0;
    for res in responses {
        let res = res.unwrap();
        match res.status() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => {
                let body: Value = res.json().await.unwrap();
                assert_eq!(body["message"], "Too Many Requests");
                rejected += 1;
            }
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(ok, 10);
    assert_eq!(rejected, 2);

    let status = common::status(&client, addr).await;
    assert_eq!(status["strategy"], "queue");
    assert_eq!(status["queue"]["in_flight"], 0);
    assert_eq!(status["queue"]["capacity"], 10);

    shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_backend_errors_pass_through_queue() {
    let (addr, shutdown) = common::start_guard(queue_config(5)).await;
    let client = common::client();

    let res = client.get(format!("http://{}/fail", addr)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.headers().get("x-ratelimit-limit").is_none());

    let res = client.get(format!("http://{}/", addr)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_frees_after_completion() {
    let (addr, shutdown) = common::start_guard(queue_config(50)).await;
    let client = common::client();
    let url = format!("http://{}/", addr);

    for _ in 0..3 {
        let responses = join_all((0..5).map(|_| client.get(&url).send())).await;
        assert!(responses
            .into_iter()
            .all(|res| res.unwrap().status() == StatusCode::OK));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_fails_queued_tickets_and_stops() {
    let (addr, shutdown, server) = common::start_guard_with_handle(queue_config(300)).await;
    let client = common::client();
    let url = format!("http://{}/", addr);

    let requests: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move { client.get(&url).send().await.unwrap().status() })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.trigger();

    let stopped = tokio::time::timeout(Duration::from_secs(5), server).await;
    assert!(matches!(stopped, Ok(Ok(Ok(())))), "server stops after draining");

    let mut statuses = Vec::new();
    for request in requests {
        statuses.push(request.await.unwrap());
    }
    statuses.sort();
    assert_eq!(
        statuses,
        vec![StatusCode::OK, StatusCode::SERVICE_UNAVAILABLE, StatusCode::SERVICE_UNAVAILABLE]
    );
}
