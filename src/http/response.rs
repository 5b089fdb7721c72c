//! Verdict to HTTP response mapping.
//!
//! # Mapping
//! - Served / Fallback → status and JSON body as produced
//! - Queue full → 429 `{"message":"Too Many Requests"}`
//! - Rate limited → 429 `Limit exceeded`
//! - Shutting down → 503
//! - Execution or wait timeout → 504, panic or lost ticket → 502
//!
//! Responses for rate-limited routes carry `X-RateLimit-Limit`,
//! `X-RateLimit-Remaining` and `X-RateLimit-Reset` (unix seconds).

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::admission::{DeliveryError, Rejection, Verdict};
use crate::security::RateLimitDecision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Build the client-visible response for a verdict.
pub fn verdict_response(verdict: Verdict, quota: Option<RateLimitDecision>) -> Response {
    let mut response = match verdict {
        Verdict::Served(backend) | Verdict::Fallback(backend) => {
            (backend.status, Json(backend.body)).into_response()
        }
        Verdict::Rejected(Rejection::QueueFull) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "message": "Too Many Requests" })),
        )
            .into_response(),
        Verdict::Rejected(Rejection::RateLimited(_)) => {
            (StatusCode::TOO_MANY_REQUESTS, "Limit exceeded").into_response()
        }
        Verdict::Rejected(Rejection::ShuttingDown) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "Shutting down" })),
        )
            .into_response(),
        Verdict::Failed(err) => {
            let status = match err {
                DeliveryError::ExecutionTimeout(_) | DeliveryError::WaitTimeout(_) => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                DeliveryError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
                DeliveryError::Panicked | DeliveryError::Dropped => StatusCode::BAD_GATEWAY,
            };
            (status, Json(json!({ "message": err.to_string() }))).into_response()
        }
    };

    if let Some(quota) = quota {
        let reset = SystemTime::now()
            .checked_add(quota.reset_after)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0))
            .unwrap_or_default();
        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset));
    }

    response
}
