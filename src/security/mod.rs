//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client fixed window quota)
//!     → circuit breaker / queue / direct pass
//! ```
//!
//! # Design Decisions
//! - Quota check is a pure predicate evaluated before any other strategy
//! - Over-quota requests are expected traffic: 429 with rate headers
//! - Windows live in a concurrent map; expired ones are swept periodically

pub mod rate_limit;

pub use rate_limit::{FixedWindowLimiter, RateLimitDecision, RateLimitSnapshot};
