//! Backend handler subsystem.
//!
//! # Data Flow
//! ```text
//! Admission verdict: pass
//!     → Backend::handle (simulated unit of work, fixed latency)
//!     → BackendResponse { status, body, latency }
//!     → StatusClassifier (success / failure / not counted)
//!     → Outcome tracker (circuit breaker strategy only)
//! ```
//!
//! # Design Decisions
//! - The admission layer only observes status and timing, never the body
//! - Backend errors are expressed as 5xx responses; they are data, not faults
//! - The trait is object safe so every strategy shares one `Arc<dyn Backend>`

pub mod classify;
pub mod unstable;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use serde_json::Value;

pub use classify::{Outcome, StatusClassifier};
pub use unstable::UnstableBackend;

/// One unit of work handed to the backend.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// Correlation id (x-request-id).
    pub request_id: String,
    pub method: Method,
    pub path: String,
    /// Rate limit key, the peer IP for HTTP traffic.
    pub client: String,
}

impl BackendRequest {
    pub fn new(method: Method, path: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            request_id: String::new(),
            method,
            path: path.into(),
            client: client.into(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// What the backend produced and how long it took.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub body: Value,
    pub latency: Duration,
}

/// The wrapped unit of work.
pub trait Backend: Send + Sync {
    /// Process a request. Never fails: failures are reported as 5xx statuses.
    fn handle(&self, request: BackendRequest) -> BoxFuture<'_, BackendResponse>;
}
