//! Simulated unstable backend.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use serde_json::json;

use crate::backend::{Backend, BackendRequest, BackendResponse};
use crate::config::BackendConfig;

/// Sleeps for a fixed latency, then succeeds, except on the failure path
/// which always answers 500.
#[derive(Debug, Clone)]
pub struct UnstableBackend {
    latency: Duration,
    failure_path: String,
}

impl UnstableBackend {
    pub fn new(latency: Duration, failure_path: impl Into<String>) -> Self {
        Self {
            latency,
            failure_path: failure_path.into(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(Duration::from_millis(config.latency_ms), config.failure_path.clone())
    }
}

impl Backend for UnstableBackend {
    fn handle(&self, request: BackendRequest) -> BoxFuture<'_, BackendResponse> {
        Box::pin(async move {
            let started = tokio::time::Instant::now();
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let status = if request.path == self.failure_path {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();

            BackendResponse {
                status,
                body: json!({ "time": now, "code": status.as_u16() }),
                latency: started.elapsed(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[tokio::test(start_paused = true)]
    async fn test_failure_path_and_latency() {
        let backend = UnstableBackend::new(Duration::from_millis(100), "/fail");

        let ok = backend.handle(BackendRequest::new(Method::GET, "/", "1.2.3.4")).await;
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.body["code"], 200);
        assert!(ok.latency >= Duration::from_millis(100));

        let failed = backend.handle(BackendRequest::new(Method::GET, "/fail", "1.2.3.4")).await;
        assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.body["code"], 500);
    }
}
