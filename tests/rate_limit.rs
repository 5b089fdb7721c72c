//! Fixed-window rate limiting over HTTP.

use std::time::Duration;

use axum::http::StatusCode;
use overload_guard::config::StrategyKind;

mod common;

fn limit_config(limit: u32, period_ms: u64) -> overload_guard::GuardConfig {
    let mut config = common::fast_config();
    config.strategy = StrategyKind::RateLimit;
    config.rate_limit.limit = limit;
    config.rate_limit.period_ms = period_ms;
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_limit_enforced_with_headers() {
    let (addr, shutdown) = common::start_guard(limit_config(3, 60_000)).await;
    let client = common::client();
    let url = format!("http://{}/", addr);

    for remaining in ["2", "1", "0"] {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-ratelimit-limit"], "3");
        assert_eq!(res.headers()["x-ratelimit-remaining"], remaining);
        assert!(res.headers().contains_key("x-ratelimit-reset"));
    }

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    assert_eq!(res.text().await.unwrap(), "Limit exceeded");

    // The status route is not rate limited.
    let status = common::status(&client, addr).await;
    assert_eq!(status["strategy"], "rate_limit");
    assert_eq!(status["rate_limit"]["tracked_keys"], 1);

    shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_window_resets() {
    let (addr, shutdown) = common::start_guard(limit_config(2, 300)).await;
    let client = common::client();
    let url = format!("http://{}/", addr);

    for _ in 0..2 {
        assert_eq!(client.get(&url).send().await.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(
        client.get(&url).send().await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(client.get(&url).send().await.unwrap().status(), StatusCode::OK);

    shutdown.trigger();
}
