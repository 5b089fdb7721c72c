//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the overload guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Which admission strategy protects the demo routes.
    pub strategy: StrategyKind,

    /// Simulated backend settings.
    pub backend: BackendConfig,

    /// Ratio-triggered circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Bounded admission queue and worker pool.
    pub queue: QueueConfig,

    /// Fixed-window rate limiter.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Admission strategy in front of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Trip to a fallback response when the failure ratio is too high.
    #[default]
    CircuitBreaker,
    /// Bounded FIFO with a fixed worker pool, reject on full.
    Queue,
    /// Direct pass behind the fixed-window rate limiter.
    RateLimit,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::CircuitBreaker => "circuit_breaker",
            StrategyKind::Queue => "queue",
            StrategyKind::RateLimit => "rate_limit",
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "circuit_breaker" => Ok(StrategyKind::CircuitBreaker),
            "queue" => Ok(StrategyKind::Queue),
            "rate_limit" => Ok(StrategyKind::RateLimit),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

/// Simulated backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Fixed processing time of every request in milliseconds.
    pub latency_ms: u64,

    /// Path that always answers with a server error.
    pub failure_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            latency_ms: 100,
            failure_path: "/fail".to_string(),
        }
    }
}

/// Half-open range of HTTP status codes, `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatusRange {
    pub from: u16,
    pub to: u16,
}

impl StatusRange {
    pub const fn new(from: u16, to: u16) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, status: u16) -> bool {
        self.from <= status && status < self.to
    }

    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }
}

/// Circuit breaker configuration.
///
/// The defaults express `ResponseCodeRatio(500, 600, 0, 600) > 0.1`: the
/// breaker trips when more than 10% of the responses in `[0, 600)` fall in
/// `[500, 600)`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure ratio that must be exceeded to trip.
    pub threshold: f64,

    /// Statuses counted as failures.
    pub failure_status: StatusRange,

    /// Statuses counted toward the total.
    pub total_status: StatusRange,

    /// Length of the trailing measurement window in seconds. Must cover at
    /// least one check period.
    pub window_secs: u64,

    /// Bucket granularity of the measurement window in milliseconds.
    pub bucket_ms: u64,

    /// How long fallback responses are served after a trip.
    pub fallback_duration_ms: u64,

    /// How long traffic is sampled before deciding to close.
    pub recovery_duration_ms: u64,

    /// Period of the failure ratio evaluation.
    pub check_period_ms: u64,

    /// Status code of the fallback response.
    pub fallback_status: u16,

    /// Message carried by the fallback response.
    pub fallback_message: String,
}

impl CircuitBreakerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn bucket(&self) -> Duration {
        Duration::from_millis(self.bucket_ms)
    }

    pub fn fallback_duration(&self) -> Duration {
        Duration::from_millis(self.fallback_duration_ms)
    }

    pub fn recovery_duration(&self) -> Duration {
        Duration::from_millis(self.recovery_duration_ms)
    }

    pub fn check_period(&self) -> Duration {
        Duration::from_millis(self.check_period_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            failure_status: StatusRange::new(500, 600),
            total_status: StatusRange::new(0, 600),
            window_secs: 20,
            bucket_ms: 1000,
            fallback_duration_ms: 5_000,
            recovery_duration_ms: 5_000,
            check_period_ms: 20_000,
            fallback_status: 503,
            fallback_message: "Service Unavailable".to_string(),
        }
    }
}

/// Bounded admission queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of admitted, not yet completed requests.
    pub capacity: usize,

    /// Number of workers executing admitted requests.
    pub workers: usize,

    /// Upper bound of a single backend execution in milliseconds.
    pub execution_timeout_ms: u64,

    /// How long a caller waits for its ticket before giving up.
    pub wait_timeout_ms: u64,
}

impl QueueConfig {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            workers: 1,
            execution_timeout_ms: 10_000,
            wait_timeout_ms: 30_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Put the limiter in front of the circuit breaker or queue strategy.
    /// The `rate_limit` strategy always uses it.
    pub enabled: bool,

    /// Window length in milliseconds.
    pub period_ms: u64,

    /// Requests allowed per key and window.
    pub limit: u32,

    /// Interval of the expired window sweep in seconds.
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period_ms: 1_000,
            limit: 200,
            sweep_interval_secs: 60,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
