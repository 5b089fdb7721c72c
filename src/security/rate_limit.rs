//! Fixed-window rate limiting per client key.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::validation::rate_limit_errors;
use crate::config::{ConfigError, RateLimitConfig};
use crate::observability::metrics;

/// Counter for one key, starting at its first request.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self { started: now, count: 0 }
    }

    fn expired(&self, now: Instant, period: Duration) -> bool {
        now.saturating_duration_since(self.started) >= period
    }
}

/// Result of one `allow` check, carried into the rate limit headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the key's window resets.
    pub reset_after: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub period_ms: u64,
    pub tracked_keys: usize,
}

/// `limit` requests per key every `period`.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: DashMap<String, Window>,
    period: Duration,
    limit: u32,
    sweep_interval: Duration,
}

impl FixedWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Result<Self, ConfigError> {
        let errors = rate_limit_errors(config);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        Ok(Self {
            windows: DashMap::new(),
            period: config.period(),
            limit: config.limit,
            sweep_interval: config.sweep_interval(),
        })
    }

    /// Count a request against `key`'s quota.
    pub fn allow(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut window = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window::new(now));
        if window.expired(now, self.period) {
            *window = Window::new(now);
        }

        let allowed = window.count < self.limit;
        if allowed {
            window.count += 1;
        }
        let decision = RateLimitDecision {
            allowed,
            limit: self.limit,
            remaining: self.limit.saturating_sub(window.count),
            reset_after: self.period.saturating_sub(now.saturating_duration_since(window.started)),
        };
        drop(window);

        if !decision.allowed {
            tracing::debug!(client = %key, "Rate limit exceeded");
            metrics::record_rate_limited();
        }
        decision
    }

    /// Drop windows that have expired. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.expired(now, self.period));
        before.saturating_sub(self.windows.len())
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            limit: self.limit,
            period_ms: self.period.as_millis() as u64,
            tracked_keys: self.windows.len(),
        }
    }

    /// Periodically sweep expired windows until shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + limiter.sweep_interval, limiter.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired rate limit windows");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}
