//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (threshold in [0, 1], durations > 0)
//! - Check status ranges are usable for ratio computation
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::schema::{CircuitBreakerConfig, GuardConfig, QueueConfig, RateLimitConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: threshold {value} is outside [0, 1]")]
    ThresholdOutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: status range [{from}, {to}) is empty")]
    EmptyStatusRange { field: &'static str, from: u16, to: u16 },

    #[error("circuit_breaker.failure_status must lie within circuit_breaker.total_status")]
    FailureOutsideTotal,

    #[error("{field}: bucket of {bucket_ms} ms does not fit a window of {window_ms} ms")]
    BucketTooWide {
        field: &'static str,
        bucket_ms: u64,
        window_ms: u64,
    },

    #[error("circuit_breaker.window_secs: window of {window_ms} ms is shorter than the check period of {check_period_ms} ms")]
    WindowShorterThanCheckPeriod { window_ms: u64, check_period_ms: u64 },

    #[error("{field}: {value} is not a valid HTTP status")]
    InvalidStatus { field: &'static str, value: u16 },

    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: {value:?} must be an absolute path other than \"/\" or /admin/status")]
    InvalidPath { field: &'static str, value: String },
}

/// Validate the whole configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    let failure_path = &config.backend.failure_path;
    if !failure_path.starts_with('/') || failure_path == "/" || failure_path == "/admin/status" {
        errors.push(ValidationError::InvalidPath {
            field: "backend.failure_path",
            value: failure_path.clone(),
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }

    errors.extend(circuit_breaker_errors(&config.circuit_breaker));
    errors.extend(queue_errors(&config.queue));
    errors.extend(rate_limit_errors(&config.rate_limit));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Problems in the circuit breaker section.
pub fn circuit_breaker_errors(cb: &CircuitBreakerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !(0.0..=1.0).contains(&cb.threshold) {
        errors.push(ValidationError::ThresholdOutOfRange {
            field: "circuit_breaker.threshold",
            value: cb.threshold,
        });
    }

    for (field, range) in [
        ("circuit_breaker.failure_status", cb.failure_status),
        ("circuit_breaker.total_status", cb.total_status),
    ] {
        if range.is_empty() {
            errors.push(ValidationError::EmptyStatusRange {
                field,
                from: range.from,
                to: range.to,
            });
        }
    }
    if !cb.failure_status.is_empty()
        && !cb.total_status.is_empty()
        && (cb.failure_status.from < cb.total_status.from || cb.failure_status.to > cb.total_status.to)
    {
        errors.push(ValidationError::FailureOutsideTotal);
    }

    for (field, value) in [
        ("circuit_breaker.window_secs", cb.window_secs),
        ("circuit_breaker.bucket_ms", cb.bucket_ms),
        ("circuit_breaker.fallback_duration_ms", cb.fallback_duration_ms),
        ("circuit_breaker.recovery_duration_ms", cb.recovery_duration_ms),
        ("circuit_breaker.check_period_ms", cb.check_period_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let window_ms = cb.window_secs.saturating_mul(1000);
    if cb.bucket_ms > 0 && window_ms > 0 && cb.bucket_ms > window_ms {
        errors.push(ValidationError::BucketTooWide {
            field: "circuit_breaker.bucket_ms",
            bucket_ms: cb.bucket_ms,
            window_ms,
        });
    }

    if window_ms > 0 && window_ms < cb.check_period_ms {
        errors.push(ValidationError::WindowShorterThanCheckPeriod {
            window_ms,
            check_period_ms: cb.check_period_ms,
        });
    }

    if StatusCode::from_u16(cb.fallback_status).is_err() {
        errors.push(ValidationError::InvalidStatus {
            field: "circuit_breaker.fallback_status",
            value: cb.fallback_status,
        });
    }

    errors
}

/// Problems in the queue section.
pub fn queue_errors(queue: &QueueConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if queue.capacity == 0 {
        errors.push(ValidationError::Zero { field: "queue.capacity" });
    }
    if queue.workers == 0 {
        errors.push(ValidationError::Zero { field: "queue.workers" });
    }
    if queue.execution_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "queue.execution_timeout_ms" });
    }
    if queue.wait_timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "queue.wait_timeout_ms" });
    }
    errors
}

/// Problems in the rate limit section.
pub fn rate_limit_errors(rl: &RateLimitConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if rl.period_ms == 0 {
        errors.push(ValidationError::Zero { field: "rate_limit.period_ms" });
    }
    if rl.limit == 0 {
        errors.push(ValidationError::Zero { field: "rate_limit.limit" });
    }
    if rl.sweep_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "rate_limit.sweep_interval_secs" });
    }
    errors
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StatusRange;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GuardConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GuardConfig::default();
        config.circuit_breaker.threshold = 1.5;
        config.circuit_breaker.check_period_ms = 0;
        config.queue.capacity = 0;
        config.rate_limit.limit = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ThresholdOutOfRange {
            field: "circuit_breaker.threshold",
            value: 1.5,
        }));
        assert!(errors.contains(&ValidationError::Zero { field: "queue.capacity" }));
    }

    #[test]
    fn test_failure_path() {
        let mut config = GuardConfig::default();
        config.backend.failure_path = "fail".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidPath { .. }));

        config.backend.failure_path = "/".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_status_ranges() {
        let mut cb = CircuitBreakerConfig::default();
        cb.failure_status = StatusRange::new(600, 500);
        let errors = circuit_breaker_errors(&cb);
        assert_eq!(
            errors,
            vec![ValidationError::EmptyStatusRange {
                field: "circuit_breaker.failure_status",
                from: 600,
                to: 500,
            }]
        );

        let mut cb = CircuitBreakerConfig::default();
        cb.total_status = StatusRange::new(0, 550);
        assert_eq!(circuit_breaker_errors(&cb), vec![ValidationError::FailureOutsideTotal]);
    }

    #[test]
    fn test_invalid_addresses() {
        let mut config = GuardConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nope".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_window_must_cover_check_period() {
        let mut cb = CircuitBreakerConfig::default();
        cb.window_secs = 10;
        assert_eq!(
            circuit_breaker_errors(&cb),
            vec![ValidationError::WindowShorterThanCheckPeriod {
                window_ms: 10_000,
                check_period_ms: 20_000,
            }]
        );

        cb.check_period_ms = 10_000;
        assert!(circuit_breaker_errors(&cb).is_empty());
    }

    #[test]
    fn test_fallback_status_and_bucket() {
        let mut cb = CircuitBreakerConfig::default();
        cb.fallback_status = 42;
        cb.bucket_ms = 60_000;
        let errors = circuit_breaker_errors(&cb);
        assert_eq!(errors.len(), 2);
    }
}
