//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! BackendRequest
//!     → facade.rs (rate limit predicate, if enabled)
//!     → active guard:
//!         - circuit breaker (fallback while tripped)
//!         - queue.rs (try_admit: admitted ticket or immediate rejection)
//!         - direct pass
//!     → Verdict { Served | Fallback | Rejected | Failed }
//! ```
//!
//! # Design Decisions
//! - Admission never waits for capacity; overload is answered immediately
//! - Every strategy is an owned object injected into the HTTP layer
//! - Overload and fallback are verdicts, not errors

pub mod facade;
pub mod queue;

pub use facade::{AdmissionFacade, AdmissionSnapshot, Guard, Rejection, Verdict};
pub use queue::{Admission, AdmissionQueue, DeliveryError, PendingTicket, QueueRejection, QueueSnapshot};
