//! Status classification for failure ratio tracking.
//!
//! A response counts toward the total when its status lies in the total
//! range, and as a failure when it also lies in the failure range. Anything
//! outside the total range is invisible to the ratio.

use axum::http::StatusCode;

use crate::config::{CircuitBreakerConfig, StatusRange};

/// Classification of a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Predicate over response statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusClassifier {
    failure: StatusRange,
    total: StatusRange,
}

impl StatusClassifier {
    pub fn new(failure: StatusRange, total: StatusRange) -> Self {
        Self { failure, total }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.failure_status, config.total_status)
    }

    pub fn classify(&self, status: StatusCode) -> Option<Outcome> {
        let code = status.as_u16();
        if !self.total.contains(code) {
            None
        } else if self.failure.contains(code) {
            Some(Outcome::Failure)
        } else {
            Some(Outcome::Success)
        }
    }
}

impl Default for StatusClassifier {
    /// 5xx over everything below 600.
    fn default() -> Self {
        Self::new(StatusRange::new(500, 600), StatusRange::new(0, 600))
    }
}
