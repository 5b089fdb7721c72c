//! Single entry point of the admission layer: decide, and optionally execute.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::admission::queue::{Admission, AdmissionQueue, DeliveryError, QueueRejection, QueueSnapshot};
use crate::backend::{Backend, BackendRequest, BackendResponse};
use crate::config::{ConfigError, GuardConfig, StrategyKind};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::{BreakerCall, BreakerSnapshot, CircuitBreaker};
use crate::security::{FixedWindowLimiter, RateLimitDecision, RateLimitSnapshot};

/// Why a request was turned away before reaching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    QueueFull,
    RateLimited(RateLimitDecision),
    ShuttingDown,
}

/// Final decision for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The backend ran; its response is delivered verbatim, 5xx included.
    Served(BackendResponse),
    /// The circuit is tripped; the configured fallback replaces the backend.
    Fallback(BackendResponse),
    Rejected(Rejection),
    /// Admitted to the queue, but no response was delivered.
    Failed(DeliveryError),
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Served(_) => "served",
            Verdict::Fallback(_) => "fallback",
            Verdict::Rejected(Rejection::QueueFull) => "queue_full",
            Verdict::Rejected(Rejection::RateLimited(_)) => "rate_limited",
            Verdict::Rejected(Rejection::ShuttingDown) => "shutting_down",
            Verdict::Failed(_) => "failed",
        }
    }
}

/// The strategy in front of the backend.
#[derive(Debug)]
pub enum Guard {
    /// Straight to the backend.
    Direct,
    CircuitBreaker(Arc<CircuitBreaker>),
    Queue(Arc<AdmissionQueue>),
}

/// Status view of the active strategy.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionSnapshot {
    pub strategy: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<BreakerSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitSnapshot>,
}

/// Composes the optional rate limit predicate with one guard.
pub struct AdmissionFacade {
    strategy: StrategyKind,
    backend: Arc<dyn Backend>,
    limiter: Option<Arc<FixedWindowLimiter>>,
    guard: Guard,
}

impl std::fmt::Debug for AdmissionFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionFacade")
            .field("strategy", &self.strategy)
            .field("limiter", &self.limiter.is_some())
            .field("guard", &self.guard)
            .finish()
    }
}

impl AdmissionFacade {
    pub fn new(
        strategy: StrategyKind,
        backend: Arc<dyn Backend>,
        limiter: Option<Arc<FixedWindowLimiter>>,
        guard: Guard,
    ) -> Self {
        Self {
            strategy,
            backend,
            limiter,
            guard,
        }
    }

    /// Build the strategy selected by `config`. Fails on an invalid section.
    pub fn from_config(config: &GuardConfig, backend: Arc<dyn Backend>) -> Result<Self, ConfigError> {
        let limiter = if config.strategy == StrategyKind::RateLimit || config.rate_limit.enabled {
            Some(Arc::new(FixedWindowLimiter::new(&config.rate_limit)?))
        } else {
            None
        };

        let guard = match config.strategy {
            StrategyKind::CircuitBreaker => {
                Guard::CircuitBreaker(Arc::new(CircuitBreaker::new(config.circuit_breaker.clone())?))
            }
            StrategyKind::Queue => {
                Guard::Queue(Arc::new(AdmissionQueue::new(config.queue.clone(), backend.clone())?))
            }
            StrategyKind::RateLimit => Guard::Direct,
        };

        Ok(Self::new(config.strategy, backend, limiter, guard))
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn limiter(&self) -> Option<&Arc<FixedWindowLimiter>> {
        self.limiter.as_ref()
    }

    /// Start the evaluator, workers and sweeper this strategy needs. Every
    /// task ends once `shutdown` fires; queue workers first fail the tickets
    /// still waiting.
    pub fn spawn_background(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut tasks = match &self.guard {
            Guard::CircuitBreaker(breaker) => vec![breaker.spawn_evaluator(shutdown.subscribe())],
            Guard::Queue(queue) => queue.spawn_workers(shutdown),
            Guard::Direct => Vec::new(),
        };
        if let Some(limiter) = &self.limiter {
            tasks.push(limiter.spawn_sweeper(shutdown.subscribe()));
        }
        tasks
    }

    /// Decide for one request and, when admitted, execute it.
    pub async fn admit(&self, request: BackendRequest) -> (Verdict, Option<RateLimitDecision>) {
        let quota = self.limiter.as_ref().map(|limiter| limiter.allow(&request.client));
        let verdict = match quota {
            Some(decision) if !decision.allowed => Verdict::Rejected(Rejection::RateLimited(decision)),
            _ => self.run_guard(request).await,
        };

        if let Verdict::Served(response) = &verdict {
            metrics::record_backend_latency(response.latency);
        }
        metrics::record_verdict(self.strategy.as_str(), verdict.label());
        (verdict, quota)
    }

    async fn run_guard(&self, request: BackendRequest) -> Verdict {
        match &self.guard {
            Guard::Direct => Verdict::Served(self.backend.handle(request).await),
            Guard::CircuitBreaker(breaker) => match breaker.call(self.backend.as_ref(), request).await {
                BreakerCall::Passed(response) => Verdict::Served(response),
                BreakerCall::Fallback(response) => Verdict::Fallback(response),
            },
            Guard::Queue(queue) => match queue.try_admit(request) {
                Admission::Admitted(ticket) => match ticket.wait().await {
                    Ok(response) => Verdict::Served(response),
                    Err(err) => Verdict::Failed(err),
                },
                Admission::Rejected(QueueRejection::Full) => Verdict::Rejected(Rejection::QueueFull),
                Admission::Rejected(QueueRejection::Closed) => Verdict::Rejected(Rejection::ShuttingDown),
            },
        }
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        let (circuit_breaker, queue) = match &self.guard {
            Guard::CircuitBreaker(breaker) => (Some(breaker.snapshot()), None),
            Guard::Queue(queue) => (None, Some(queue.snapshot())),
            Guard::Direct => (None, None),
        };
        AdmissionSnapshot {
            strategy: self.strategy.as_str(),
            circuit_breaker,
            queue,
            rate_limit: self.limiter.as_ref().map(|limiter| limiter.snapshot()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use axum::http::{Method, StatusCode};
    use futures_util::future::BoxFuture;
    use crate::resilience::CircuitState;

    struct CountingBackend {
        calls: AtomicUsize,
    }

    impl Backend for CountingBackend {
        fn handle(&self, request: BackendRequest) -> BoxFuture<'_, BackendResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = if request.path == "/fail" {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            Box::pin(async move {
                BackendResponse {
                    status,
                    body: serde_json::Value::Null,
                    latency: Duration::ZERO,
                }
            })
        }
    }

    fn backend() -> Arc<CountingBackend> {
        Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
        })
    }

    fn request(path: &str, client: &str) -> BackendRequest {
        BackendRequest::new(Method::GET, path, client)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_strategy() {
        let mut config = GuardConfig::default();
        config.strategy = StrategyKind::RateLimit;
        config.rate_limit.limit = 2;
        let backend = backend();
        let facade = AdmissionFacade::from_config(&config, backend.clone()).unwrap();

        for _ in 0..2 {
            let (verdict, quota) = facade.admit(request("/", "1.1.1.1")).await;
            assert!(matches!(verdict, Verdict::Served(_)));
            assert!(quota.unwrap().allowed);
        }
        let (verdict, _) = facade.admit(request("/", "1.1.1.1")).await;
        assert!(matches!(verdict, Verdict::Rejected(Rejection::RateLimited(d)) if d.remaining == 0));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);

        let (verdict, _) = facade.admit(request("/", "2.2.2.2")).await;
        assert!(matches!(verdict, Verdict::Served(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failures_are_delivered_verbatim() {
        let config = GuardConfig::default();
        let facade = AdmissionFacade::from_config(&config, backend()).unwrap();

        let (verdict, quota) = facade.admit(request("/fail", "1.1.1.1")).await;
        assert!(quota.is_none());
        match verdict {
            Verdict::Served(response) => assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR),
            other => panic!("expected served, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_fallback_skips_backend() {
        let config = GuardConfig::default();
        let backend = backend();
        let facade = AdmissionFacade::from_config(&config, backend.clone()).unwrap();
        let Guard::CircuitBreaker(breaker) = facade.guard() else {
            panic!("expected circuit breaker guard");
        };

        for _ in 0..10 {
            facade.admit(request("/fail", "1.1.1.1")).await;
        }
        assert_eq!(breaker.evaluate(), Some(CircuitState::Tripped));

        let (verdict, _) = facade.admit(request("/", "1.1.1.1")).await;
        assert!(matches!(verdict, Verdict::Fallback(ref r) if r.status == StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 10);
        assert_eq!(facade.snapshot().circuit_breaker.unwrap().state, CircuitState::Tripped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiter_in_front_of_queue() {
        let mut config = GuardConfig::default();
        config.strategy = StrategyKind::Queue;
        config.rate_limit.enabled = true;
        config.rate_limit.limit = 1;
        let facade = AdmissionFacade::from_config(&config, backend()).unwrap();
        let shutdown = Shutdown::new();
        let tasks = facade.spawn_background(&shutdown);
        assert_eq!(tasks.len(), 2, "one worker and the sweeper");

        let (verdict, _) = facade.admit(request("/", "1.1.1.1")).await;
        assert!(matches!(verdict, Verdict::Served(_)));
        let (verdict, _) = facade.admit(request("/", "1.1.1.1")).await;
        assert!(matches!(verdict, Verdict::Rejected(Rejection::RateLimited(_))));

        let snapshot = facade.snapshot();
        assert_eq!(snapshot.strategy, "queue");
        assert_eq!(snapshot.queue.unwrap().in_flight, 0);
        assert_eq!(snapshot.rate_limit.unwrap().tracked_keys, 1);

        shutdown.trigger();
        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_tasks_finish_on_shutdown() {
        let mut config = GuardConfig::default();
        config.strategy = StrategyKind::Queue;
        let facade = AdmissionFacade::from_config(&config, backend()).unwrap();
        let shutdown = Shutdown::new();
        let tasks = facade.spawn_background(&shutdown);

        shutdown.trigger();
        for task in tasks {
            task.await.unwrap();
        }

        // Workers closed admission while draining.
        let (verdict, _) = facade.admit(request("/", "1.1.1.1")).await;
        assert_eq!(verdict, Verdict::Rejected(Rejection::ShuttingDown));
    }

    #[test]
    fn test_invalid_section_fails_construction() {
        let mut config = GuardConfig::default();
        config.strategy = StrategyKind::Queue;
        config.queue.workers = 0;
        assert!(AdmissionFacade::from_config(&config, backend()).is_err());
    }
}
