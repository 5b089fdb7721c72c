//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Overload rejections are expected traffic: counted, logged at debug
//! - Circuit transitions are rare and always logged
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
