//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build strategy → Spawn background tasks → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     SIGINT/SIGTERM → broadcast → evaluator, workers, sweeper and server stop
//! ```
//!
//! # Design Decisions
//! - Fail fast: any configuration error is fatal before traffic is served
//! - Background tasks are owned, never free-running: each listens for shutdown
//! - Queued tickets are failed explicitly on shutdown, never silently lost

pub mod shutdown;

pub use shutdown::{wait_for_signal, Shutdown};
