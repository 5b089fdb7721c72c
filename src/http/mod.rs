//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout, tracing)
//!     → request.rs (assign and propagate request ID)
//!     → admission facade (rate limit, then breaker / queue / direct)
//!     → response.rs (verdict → status, body, rate headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use response::verdict_response;
pub use server::{AppState, HttpServer};
