//! Ratio-triggered circuit breaker.
//!
//! # States
//! - Closed: normal operation, requests pass through, outcomes recorded
//! - Tripped: backend assumed unhealthy, every request gets the fallback
//! - Recovering: requests pass through again to sample real health
//!
//! # State Transitions
//! ```text
//! Closed → Tripped:      failure ratio > threshold at a check period tick
//! Tripped → Recovering:  fallback duration elapsed since the trip
//! Recovering → Tripped:  recovery duration elapsed, ratio still > threshold
//! Recovering → Closed:   recovery duration elapsed, ratio <= threshold
//! ```
//!
//! # Design Decisions
//! - Only `evaluate` writes the state; the request path reads an atomic
//! - The outcome window is cleared on every trip, so Recovering decides on
//!   samples taken after the fallback period
//! - The evaluator wakes on the check period and on the pending timed
//!   deadline, so timed transitions do not wait for the next ratio check
//! - Fallback responses never feed the outcome window

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::backend::{Backend, BackendRequest, BackendResponse, StatusClassifier};
use crate::config::validation::circuit_breaker_errors;
use crate::config::{CircuitBreakerConfig, ConfigError};
use crate::observability::metrics;
use crate::resilience::outcome::{OutcomeCounts, OutcomeTracker};

/// Circuit state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Tripped = 1,
    Recovering = 2,
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Tripped,
            2 => CircuitState::Recovering,
            _ => CircuitState::Closed,
        }
    }
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Tripped => "tripped",
            CircuitState::Recovering => "recovering",
        }
    }
}

/// Result of routing one request through the breaker.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakerCall {
    /// The backend was invoked.
    Passed(BackendResponse),
    /// The circuit is tripped; the backend was not invoked.
    Fallback(BackendResponse),
}

/// Point-in-time view for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failures: u64,
    pub total: u64,
    pub ratio: f64,
    pub threshold: f64,
}

/// When the current state was entered.
#[derive(Debug)]
struct Timeline {
    entered_at: Instant,
}

/// Circuit breaker protecting a single backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    classifier: StatusClassifier,
    fallback_status: StatusCode,
    state: AtomicU8,
    timeline: Mutex<Timeline>,
    tracker: OutcomeTracker,
    state_tx: watch::Sender<CircuitState>,
}

impl CircuitBreaker {
    /// Create a closed breaker. Fails if the configuration is self-contradictory.
    pub fn new(config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        let errors = circuit_breaker_errors(&config);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        let fallback_status = StatusCode::from_u16(config.fallback_status)
            .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
        let (state_tx, _) = watch::channel(CircuitState::Closed);

        Ok(Self {
            classifier: StatusClassifier::from_config(&config),
            fallback_status,
            state: AtomicU8::new(CircuitState::Closed as u8),
            timeline: Mutex::new(Timeline {
                entered_at: Instant::now(),
            }),
            tracker: OutcomeTracker::new(config.window(), config.bucket()),
            state_tx,
            config,
        })
    }

    /// Current state. Lock-free.
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<CircuitState> {
        self.state_tx.subscribe()
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Route a request: fallback while tripped, otherwise invoke the backend
    /// and record its outcome.
    pub async fn call(&self, backend: &dyn Backend, request: BackendRequest) -> BreakerCall {
        if self.state() == CircuitState::Tripped {
            tracing::debug!(request_id = %request.request_id, "Circuit tripped, serving fallback");
            return BreakerCall::Fallback(self.fallback_response());
        }

        let response = backend.handle(request).await;
        self.record(response.status);
        BreakerCall::Passed(response)
    }

    /// Record a completed request's status.
    ///
    /// Completions landing after a trip are dropped so they do not leak into
    /// the window the Recovering phase will judge.
    pub fn record(&self, status: StatusCode) {
        if self.state() == CircuitState::Tripped {
            return;
        }
        if let Some(outcome) = self.classifier.classify(status) {
            self.tracker.record(outcome);
        }
    }

    /// The response substituted for the backend while tripped.
    pub fn fallback_response(&self) -> BackendResponse {
        BackendResponse {
            status: self.fallback_status,
            body: json!({
                "message": self.config.fallback_message,
                "code": self.fallback_status.as_u16(),
            }),
            latency: Duration::ZERO,
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let OutcomeCounts { failures, total } = self.tracker.counts();
        BreakerSnapshot {
            state: self.state(),
            failures,
            total,
            ratio: OutcomeCounts { failures, total }.ratio(),
            threshold: self.config.threshold,
        }
    }

    /// Run one evaluation. Returns the new state if a transition happened.
    pub fn evaluate(&self) -> Option<CircuitState> {
        let now = Instant::now();
        let mut timeline = self.lock_timeline();
        let current = self.state();

        let next = match current {
            CircuitState::Closed => {
                let counts = self.tracker.counts();
                (counts.ratio() > self.config.threshold).then_some(CircuitState::Tripped)
            }
            CircuitState::Tripped => (now >= timeline.entered_at + self.config.fallback_duration())
                .then_some(CircuitState::Recovering),
            CircuitState::Recovering => {
                if now >= timeline.entered_at + self.config.recovery_duration() {
                    if self.tracker.ratio() > self.config.threshold {
                        Some(CircuitState::Tripped)
                    } else {
                        Some(CircuitState::Closed)
                    }
                } else {
                    None
                }
            }
        }?;

        let counts = self.tracker.counts();
        if next == CircuitState::Tripped {
            self.tracker.reset();
        }
        timeline.entered_at = now;
        self.state.store(next as u8, Ordering::Release);
        drop(timeline);

        if next == CircuitState::Tripped {
            tracing::warn!(
                from = current.as_str(),
                failures = counts.failures,
                total = counts.total,
                ratio = counts.ratio(),
                threshold = self.config.threshold,
                fallback_ms = self.config.fallback_duration_ms,
                "Circuit tripped"
            );
        } else {
            tracing::info!(
                from = current.as_str(),
                to = next.as_str(),
                failures = counts.failures,
                total = counts.total,
                "Circuit state changed"
            );
        }
        metrics::record_circuit_transition(current.as_str(), next.as_str(), next as u8);
        self.state_tx.send_replace(next);

        Some(next)
    }

    /// Instant at which the current state expires on its own, if any.
    fn next_deadline(&self) -> Option<Instant> {
        let timeline = self.lock_timeline();
        match self.state() {
            CircuitState::Closed => None,
            CircuitState::Tripped => Some(timeline.entered_at + self.config.fallback_duration()),
            CircuitState::Recovering => Some(timeline.entered_at + self.config.recovery_duration()),
        }
    }

    /// Spawn the periodic evaluator. It stops when `shutdown` fires or its
    /// sender is dropped.
    pub fn spawn_evaluator(self: &Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let breaker = Arc::clone(self);
        tokio::spawn(async move { breaker.run_evaluator(shutdown).await })
    }

    async fn run_evaluator(&self, mut shutdown: broadcast::Receiver<()>) {
        let period = self.config.check_period();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            check_period_ms = self.config.check_period_ms,
            threshold = self.config.threshold,
            "Circuit breaker evaluator starting"
        );

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                _ = ticker.tick() => {
                    self.evaluate();
                }
                _ = sleep_until(deadline) => {
                    self.evaluate();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Circuit breaker evaluator received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn lock_timeline(&self) -> MutexGuard<'_, Timeline> {
        self.timeline.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
