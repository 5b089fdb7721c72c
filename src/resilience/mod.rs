//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request under the circuit breaker strategy:
//!     → circuit_breaker.rs (read state: fallback if tripped)
//!     → backend
//!     → outcome.rs (record success/failure into the rolling window)
//!
//! Periodic evaluator (single task):
//!     → outcome.rs (failure ratio over the trailing window)
//!     → circuit_breaker.rs (Closed / Tripped / Recovering transition)
//! ```
//!
//! # Design Decisions
//! - One breaker per protected backend, shared by every route
//! - Fail fast in Tripped state (no backend call at all)
//! - Hysteresis through fixed fallback and recovery durations

pub mod circuit_breaker;
pub mod outcome;

pub use circuit_breaker::{BreakerCall, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use outcome::{OutcomeCounts, OutcomeTracker};
