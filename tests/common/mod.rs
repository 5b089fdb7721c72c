//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use overload_guard::config::GuardConfig;
use overload_guard::{HttpServer, Shutdown};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Boot a guard on an ephemeral local port.
pub async fn start_guard(config: GuardConfig) -> (SocketAddr, Shutdown) {
    let (addr, shutdown, _server) = start_guard_with_handle(config).await;
    (addr, shutdown)
}

/// Boot a guard and keep the handle of the serving task.
pub async fn start_guard_with_handle(
    mut config: GuardConfig,
) -> (SocketAddr, Shutdown, JoinHandle<std::io::Result<()>>) {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    (addr, shutdown, handle)
}

/// Config with a fast backend so tests spend little wall time.
pub fn fast_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.backend.latency_ms = 5;
    config
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

pub async fn status(client: &reqwest::Client, addr: SocketAddr) -> Value {
    client
        .get(format!("http://{}/admin/status", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Poll the status endpoint until the breaker reports `state`.
pub async fn wait_for_breaker_state(
    client: &reqwest::Client,
    addr: SocketAddr,
    state: &str,
    within: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if status(client, addr).await["circuit_breaker"]["state"] == state {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
