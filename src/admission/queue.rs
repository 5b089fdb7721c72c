//! Bounded admission queue with a fixed worker pool.
//!
//! # Responsibilities
//! - Admit or reject without waiting (`try_admit` never suspends)
//! - Hand admitted tickets to workers in strict FIFO order
//! - Fire each ticket's completion signal exactly once
//!
//! # Design Decisions
//! - Capacity counts resident tickets: a semaphore permit is taken on
//!   admission and travels inside the ticket until it completes
//! - Workers share the receiving half behind an async mutex; dequeue is FIFO,
//!   completion order across workers is not
//! - A panicking or stuck backend fails its own ticket and the worker moves on
//! - Callers bound their wait; a ticket whose caller left is skipped

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tokio::time;

use crate::backend::{Backend, BackendRequest, BackendResponse};
use crate::config::validation::queue_errors;
use crate::config::{ConfigError, QueueConfig};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Why an admitted ticket did not produce a backend response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("backend execution exceeded {0:?}")]
    ExecutionTimeout(Duration),

    #[error("no completion within {0:?}")]
    WaitTimeout(Duration),

    #[error("backend panicked while executing the request")]
    Panicked,

    #[error("queue shut down before the request was executed")]
    Shutdown,

    #[error("ticket dropped without completion")]
    Dropped,
}

/// Why a request was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRejection {
    /// `capacity` tickets are already resident.
    Full,
    /// The queue is shutting down.
    Closed,
}

/// Outcome of `try_admit`.
#[derive(Debug)]
pub enum Admission {
    Admitted(PendingTicket),
    Rejected(QueueRejection),
}

type Completion = Result<BackendResponse, DeliveryError>;

/// A request awaiting execution, owned by the queue until a worker claims it.
struct Ticket {
    request: BackendRequest,
    done: oneshot::Sender<Completion>,
    _permit: OwnedSemaphorePermit,
}

impl Ticket {
    /// Release the slot, then fire the signal. Consumes the ticket, so the
    /// signal fires at most once.
    fn complete(self, result: Completion) {
        let Ticket { done, _permit, .. } = self;
        drop(_permit);
        // The caller may have timed out; nothing left to deliver to.
        let _ = done.send(result);
    }
}

/// Caller side of an admitted ticket.
#[derive(Debug)]
pub struct PendingTicket {
    done: oneshot::Receiver<Completion>,
    wait_timeout: Duration,
}

impl PendingTicket {
    /// Wait for the completion signal, at most the configured wait timeout.
    pub async fn wait(self) -> Completion {
        match time::timeout(self.wait_timeout, self.done).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DeliveryError::Dropped),
            Err(_) => Err(DeliveryError::WaitTimeout(self.wait_timeout)),
        }
    }
}

/// Point-in-time view for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub capacity: usize,
    pub workers: usize,
    pub depth: usize,
    pub in_flight: usize,
}

/// Fixed-capacity FIFO in front of the backend.
pub struct AdmissionQueue {
    config: QueueConfig,
    backend: Arc<dyn Backend>,
    permits: Arc<Semaphore>,
    tx: mpsc::Sender<Ticket>,
    rx: Mutex<mpsc::Receiver<Ticket>>,
    depth: AtomicUsize,
}

impl std::fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("config", &self.config)
            .field("depth", &self.depth())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl AdmissionQueue {
    /// Create the queue. Workers are started separately with `spawn_workers`.
    pub fn new(config: QueueConfig, backend: Arc<dyn Backend>) -> Result<Self, ConfigError> {
        let errors = queue_errors(&config);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        let (tx, rx) = mpsc::channel(config.capacity);

        Ok(Self {
            permits: Arc::new(Semaphore::new(config.capacity)),
            tx,
            rx: Mutex::new(rx),
            depth: AtomicUsize::new(0),
            backend,
            config,
        })
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Tickets waiting for a worker.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Tickets admitted and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.config.capacity.saturating_sub(self.permits.available_permits())
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            capacity: self.config.capacity,
            workers: self.config.workers,
            depth: self.depth(),
            in_flight: self.in_flight(),
        }
    }

    /// Admit the request or reject it immediately. Never waits for capacity.
    pub fn try_admit(&self, request: BackendRequest) -> Admission {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                tracing::debug!(
                    request_id = %request.request_id,
                    capacity = self.config.capacity,
                    "Queue full, rejecting"
                );
                metrics::record_queue_rejected();
                return Admission::Rejected(QueueRejection::Full);
            }
            Err(TryAcquireError::Closed) => return Admission::Rejected(QueueRejection::Closed),
        };

        let (done, rx) = oneshot::channel();
        let ticket = Ticket {
            request,
            done,
            _permit: permit,
        };

        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        match self.tx.try_send(ticket) {
            Ok(()) => {
                metrics::record_queue_depth(depth, self.in_flight());
                Admission::Admitted(PendingTicket {
                    done: rx,
                    wait_timeout: self.config.wait_timeout(),
                })
            }
            Err(err) => {
                self.depth.fetch_sub(1, Ordering::Relaxed);
                match err {
                    TrySendError::Full(_) => {
                        metrics::record_queue_rejected();
                        Admission::Rejected(QueueRejection::Full)
                    }
                    TrySendError::Closed(_) => Admission::Rejected(QueueRejection::Closed),
                }
            }
        }
    }

    /// Start the worker pool. Workers stop between tickets on shutdown and
    /// fail whatever is still queued.
    pub fn spawn_workers(self: &Arc<Self>, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        tracing::info!(
            capacity = self.config.capacity,
            workers = self.config.workers,
            "Admission queue workers starting"
        );
        (0..self.config.workers)
            .map(|id| {
                let queue = Arc::clone(self);
                let shutdown = shutdown.subscribe();
                tokio::spawn(async move { queue.run_worker(id, shutdown).await })
            })
            .collect()
    }

    async fn run_worker(&self, id: usize, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let ticket = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!(worker = id, "Queue worker received shutdown signal, exiting loop");
                    break;
                }
                ticket = self.next_ticket() => ticket,
            };
            match ticket {
                Some(ticket) => self.execute(id, ticket).await,
                None => break,
            }
        }
        self.drain().await;
    }

    async fn next_ticket(&self) -> Option<Ticket> {
        let ticket = self.rx.lock().await.recv().await;
        if ticket.is_some() {
            let depth = self.depth.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
            metrics::record_queue_depth(depth, self.in_flight());
        }
        ticket
    }

    async fn execute(&self, worker: usize, ticket: Ticket) {
        if ticket.done.is_closed() {
            tracing::debug!(worker, request_id = %ticket.request.request_id, "Caller gone, skipping ticket");
            return;
        }
        tracing::debug!(
            worker,
            request_id = %ticket.request.request_id,
            queue_len = self.depth(),
            "Dequeued ticket"
        );

        let request = ticket.request.clone();
        let request_id = request.request_id.clone();
        let run = AssertUnwindSafe(async { self.backend.handle(request).await }).catch_unwind();
        let limit = self.config.execution_timeout();

        let result = match time::timeout(limit, run).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                tracing::error!(worker, request_id = %request_id, "Backend panicked");
                Err(DeliveryError::Panicked)
            }
            Err(_) => {
                tracing::warn!(worker, request_id = %request_id, timeout = ?limit, "Backend execution timed out");
                Err(DeliveryError::ExecutionTimeout(limit))
            }
        };
        ticket.complete(result);
    }

    /// Close admission and fail every ticket still waiting.
    async fn drain(&self) {
        self.permits.close();
        let mut rx = self.rx.lock().await;
        rx.close();
        let mut failed = 0usize;
        while let Ok(ticket) = rx.try_recv() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            ticket.complete(Err(DeliveryError::Shutdown));
            failed += 1;
        }
        if failed > 0 {
            tracing::warn!(failed, "Failed queued tickets on shutdown");
        }
    }
}
