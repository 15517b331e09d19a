//! Response-processing queue.
//!
//! One dedicated OS thread drains a FIFO channel of completed requests and runs
//! their completions strictly in submission order. It shares no thread with the
//! execution workers, the transport or the caller, so a blocked exchange never
//! delays response handling and a slow completion never delays an exchange.
//!
//! Discarding is generation based: [`ResponseQueue::cancel_all`] bumps a
//! counter, and any job stamped with an older generation is resolved as
//! [`CancelReason::Discarded`] instead of being processed.

use crate::auth::Authenticator;
use crate::outcome::{CancelReason, Outcome};
use crate::queue::QueueMetrics;
use crate::request::Operation;
use may::sync::mpsc;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};

pub(crate) struct ResponseJob {
    op: Arc<Operation>,
    outcome: Outcome,
    generation: u64,
}

/// Cloneable submission side of the response queue
#[derive(Clone)]
pub(crate) struct ResponseSender {
    tx: mpsc::Sender<ResponseJob>,
    shared: Arc<ResponseShared>,
}

struct ResponseShared {
    generation: AtomicU64,
    authenticator: Option<Arc<dyn Authenticator>>,
    metrics: Arc<QueueMetrics>,
}

impl ResponseSender {
    /// Hand a resolved request to the response worker
    pub(crate) fn submit(&self, op: Arc<Operation>, outcome: Outcome) {
        let generation = self.shared.generation.load(Ordering::Acquire);
        self.shared.metrics.record_response_submitted();
        trace!(
            request_id = %op.id(),
            outcome = outcome.label(),
            generation = generation,
            "Response submitted"
        );
        let job = ResponseJob {
            op,
            outcome,
            generation,
        };
        if let Err(err) = self.tx.send(job) {
            // Worker is gone; resolve on this thread so the completion still runs once.
            let job = err.0;
            error!(
                request_id = %job.op.id(),
                "Response worker unavailable - running completion inline"
            );
            self.shared.process(job);
        }
    }
}

impl ResponseShared {
    fn process(&self, job: ResponseJob) {
        let ResponseJob {
            op,
            outcome,
            generation,
        } = job;
        let current = self.generation.load(Ordering::Acquire);

        let outcome = if generation < current && !outcome.is_cancelled() {
            debug!(
                request_id = %op.id(),
                kind = %op.request().kind(),
                "Discarding response after cancel_all_operations"
            );
            Outcome::Cancelled(CancelReason::Discarded)
        } else {
            outcome
        };

        if !outcome.is_cancelled() {
            if let Some(auth) = &self.authenticator {
                auth.observe(op.request(), &outcome);
            }
        }

        let Some(completion) = op.settle(&outcome) else {
            self.metrics.record_response_skipped();
            debug!(request_id = %op.id(), "Completion already delivered");
            return;
        };

        let cancelled = outcome.is_cancelled();
        let request_id = op.id();
        let label = outcome.label();
        if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            completion(outcome);
        })) {
            error!(
                request_id = %request_id,
                panic_message = ?panic,
                "Completion panicked"
            );
        }
        self.metrics.record_response_processed(cancelled);
        debug!(request_id = %request_id, outcome = label, "Response processed");
    }
}

/// Single ordered worker thread running completions
pub(crate) struct ResponseQueue {
    sender: ResponseSender,
}

impl ResponseQueue {
    /// Spawn the response thread
    pub(crate) fn start(
        stack_size: usize,
        authenticator: Option<Arc<dyn Authenticator>>,
        metrics: Arc<QueueMetrics>,
    ) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<ResponseJob>();
        let shared = Arc::new(ResponseShared {
            generation: AtomicU64::new(0),
            authenticator,
            metrics,
        });
        let worker_shared = Arc::clone(&shared);

        std::thread::Builder::new()
            .name("brrtdispatch-responses".to_string())
            .stack_size(stack_size)
            .spawn(move || {
                debug!("Response worker started");
                for job in rx.iter() {
                    worker_shared.process(job);
                }
                debug!("Response worker exiting");
            })?;

        Ok(Self {
            sender: ResponseSender { tx, shared },
        })
    }

    pub(crate) fn sender(&self) -> ResponseSender {
        self.sender.clone()
    }

    /// Discard every job submitted before this call. Returns the new generation.
    pub(crate) fn cancel_all(&self) -> u64 {
        let generation = self.sender.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation = generation, "Response queue cancelled");
        generation
    }
}
