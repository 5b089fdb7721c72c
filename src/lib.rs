//! Overload guard library: a circuit breaker, a bounded admission queue and
//! a fixed-window rate limiter in front of a simulated unstable backend.

pub mod admission;
pub mod backend;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::GuardConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
