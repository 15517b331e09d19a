//! Execution queue.
//!
//! A fixed set of worker threads pulls admitted operations from a shared
//! pending list and runs them against the [`Transport`]. Each worker owns an OS
//! thread, so a transport that blocks holds exactly one slot of the pool and
//! nothing else. The pending and
//! running sets live behind one lock, which is also where the admission policy
//! is evaluated, so "scan, cancel matches, insert" happens as one step.
//!
//! Suspension only stops workers from taking new operations. Whatever is
//! already running carries on, and the response queue is never touched.
//!
//! ## Configuration
//!
//! - `BRRTD_EXEC_WORKERS`: number of worker threads (default: 4)
//! - `BRRTD_STACK_SIZE`: worker stack size, decimal or `0x` hex (default: 0x40000)
//!
//! The queue lock and condvar come from `may::sync`, which parks OS threads and
//! yields coroutines alike, so `enqueue` stays safe to call from a coroutine.

use crate::auth::Authenticator;
use crate::ids::RequestId;
use crate::outcome::{CancelReason, Outcome};
use crate::policy::{self, Verdict};
use crate::queue::response::ResponseSender;
use crate::queue::QueueMetrics;
use crate::request::Operation;
use crate::transport::Transport;
use may::sync::{Condvar, Mutex, MutexGuard};
use serde::Deserialize;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, PoisonError};
use tracing::{debug, error, info, warn};

pub(crate) const DEFAULT_WORKERS: usize = 4;
pub(crate) const DEFAULT_STACK_SIZE: usize = 0x40000;

/// Sizing of the execution worker pool
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum number of requests running at once
    pub max_concurrent: usize,
    /// Stack size for the worker and response threads
    pub stack_size: usize,
}

impl ExecutionConfig {
    pub fn new(max_concurrent: usize, stack_size: usize) -> Self {
        Self {
            max_concurrent,
            stack_size,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let max_concurrent = std::env::var("BRRTD_EXEC_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_WORKERS);

        let stack_size = std::env::var("BRRTD_STACK_SIZE")
            .ok()
            .and_then(|s| parse_stack_size(&s))
            .unwrap_or(DEFAULT_STACK_SIZE);

        Self {
            max_concurrent,
            stack_size,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_WORKERS,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

/// Parse a stack size given in decimal or `0x`-prefixed hex
pub(crate) fn parse_stack_size(s: &str) -> Option<usize> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Arc<Operation>>,
    running: Vec<Arc<Operation>>,
    suspended: bool,
    shutdown: bool,
}

impl QueueState {
    /// Operations the admission policy still has to consider
    fn live(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.pending
            .iter()
            .chain(self.running.iter())
            .filter(|op| !op.token().is_cancelled())
    }

    fn take_pending(&mut self, id: RequestId) -> Option<Arc<Operation>> {
        let pos = self.pending.iter().position(|op| op.id() == id)?;
        self.pending.remove(pos)
    }
}

struct ExecShared {
    state: Mutex<QueueState>,
    available: Condvar,
    responses: ResponseSender,
    metrics: Arc<QueueMetrics>,
}

impl ExecShared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_depths(&self, state: &QueueState) {
        self.metrics
            .set_depths(state.pending.len(), state.running.len());
    }

    /// Block until an operation may be started. `None` once shut down.
    fn next(&self) -> Option<Arc<Operation>> {
        let mut state = self.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if !state.suspended {
                if let Some(op) = state.pending.pop_front() {
                    state.running.push(Arc::clone(&op));
                    self.publish_depths(&state);
                    return Some(op);
                }
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn finish(&self, op: &Arc<Operation>) {
        let mut state = self.lock();
        state.running.retain(|running| !Arc::ptr_eq(running, op));
        self.publish_depths(&state);
    }

    fn run(
        &self,
        worker_id: usize,
        op: Arc<Operation>,
        transport: &dyn Transport,
        authenticator: Option<&dyn Authenticator>,
    ) {
        if !op.try_start() {
            debug!(
                request_id = %op.id(),
                worker_id = worker_id,
                "Request cancelled before start"
            );
            self.finish(&op);
            self.responses
                .submit(op, Outcome::Cancelled(CancelReason::CancelledBeforeStart));
            return;
        }

        let mut request = op.request().clone();
        if let Some(auth) = authenticator {
            auth.authorize(&mut request);
        }

        debug!(
            request_id = %op.id(),
            kind = %request.kind(),
            worker_id = worker_id,
            waited = ?op.id().age(),
            "Worker executing request"
        );

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            transport.execute(&request, op.token())
        }));
        self.finish(&op);

        let outcome = match result {
            _ if op.token().is_cancelled() => Outcome::Cancelled(CancelReason::CancelledInFlight),
            Ok(result) => Outcome::from(result),
            Err(panic) => {
                error!(
                    request_id = %op.id(),
                    worker_id = worker_id,
                    panic_message = ?panic,
                    "Transport panicked"
                );
                Outcome::Failure(crate::outcome::TransportError::Other {
                    message: "transport panicked".to_string(),
                })
            }
        };
        self.responses.submit(op, outcome);
    }
}

/// Bounded pool of worker threads executing admitted requests
pub(crate) struct ExecutionQueue {
    shared: Arc<ExecShared>,
    config: ExecutionConfig,
}

impl ExecutionQueue {
    /// Spawn `config.max_concurrent` workers
    pub(crate) fn start(
        config: ExecutionConfig,
        transport: Arc<dyn Transport>,
        authenticator: Option<Arc<dyn Authenticator>>,
        responses: ResponseSender,
        metrics: Arc<QueueMetrics>,
    ) -> io::Result<Self> {
        let shared = Arc::new(ExecShared {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            responses,
            metrics,
        });

        info!(
            num_workers = config.max_concurrent,
            stack_size = config.stack_size,
            "Starting execution queue"
        );

        for worker_id in 0..config.max_concurrent.max(1) {
            let shared = Arc::clone(&shared);
            let transport = Arc::clone(&transport);
            let authenticator = authenticator.clone();

            // Plain OS thread per worker; transports may block it.
            let spawn_result = std::thread::Builder::new()
                .name(format!("brrtdispatch-exec-{worker_id}"))
                .stack_size(config.stack_size)
                .spawn(move || {
                    debug!(worker_id = worker_id, "Execution worker started");
                    while let Some(op) = shared.next() {
                        shared.run(worker_id, op, transport.as_ref(), authenticator.as_deref());
                    }
                    debug!(worker_id = worker_id, "Execution worker exiting");
                });

            if let Err(e) = spawn_result {
                error!(
                    worker_id = worker_id,
                    error = %e,
                    "Failed to spawn execution worker"
                );
                if worker_id == 0 {
                    return Err(e);
                }
            }
        }

        Ok(Self { shared, config })
    }

    pub(crate) fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Evaluate the admission policy for `op` and apply the verdict atomically
    pub(crate) fn admit(&self, op: Arc<Operation>) -> Verdict {
        let mut state = self.shared.lock();
        let verdict = policy::evaluate(op.request(), state.live().map(|live| live.request()));

        if verdict == Verdict::Reject {
            op.mark_cancelled();
            self.shared.metrics.record_rejection();
            warn!(
                request_id = %op.id(),
                kind = %op.request().kind(),
                "Request rejected - same kind already active"
            );
            drop(state);
            self.shared
                .responses
                .submit(op, Outcome::Cancelled(CancelReason::RejectedByPolicy));
            return Verdict::Reject;
        }

        if let Verdict::EvictThenAdmit(ids) = &verdict {
            let mut evicted = Vec::new();
            for id in ids {
                if let Some(victim) = state.take_pending(*id) {
                    victim.mark_cancelled();
                    evicted.push(victim);
                } else if let Some(victim) = state.running.iter().find(|r| r.id() == *id) {
                    // Resolves as CancelledInFlight once its transport returns.
                    victim.token().cancel();
                }
            }
            self.shared.metrics.record_evictions(ids.len());
            warn!(
                request_id = %op.id(),
                kind = %op.request().kind(),
                behaviour = %op.request().queuing_behaviour(),
                evicted = ids.len(),
                "Evicting active requests"
            );
            for victim in evicted {
                self.shared
                    .responses
                    .submit(victim, Outcome::Cancelled(CancelReason::Evicted));
            }
        }

        op.mark_queued();
        state.pending.push_back(op);
        self.shared.metrics.record_admission();
        self.shared.publish_depths(&state);
        drop(state);
        self.shared.available.notify_one();
        verdict
    }

    /// Remove a still-queued operation and resolve it as cancelled.
    /// A running operation only keeps its flag and resolves when the transport returns.
    pub(crate) fn withdraw(&self, op: &Arc<Operation>) -> bool {
        let mut state = self.shared.lock();
        let Some(op) = state.take_pending(op.id()) else {
            return false;
        };
        self.shared.publish_depths(&state);
        drop(state);
        op.mark_cancelled();
        debug!(request_id = %op.id(), "Queued request withdrawn");
        self.shared
            .responses
            .submit(op, Outcome::Cancelled(CancelReason::CancelledBeforeStart));
        true
    }

    /// Cancel every queued and running operation. Returns how many were affected.
    pub(crate) fn cancel_all(&self) -> usize {
        let mut state = self.shared.lock();
        let pending: Vec<_> = state.pending.drain(..).collect();
        let mut affected = pending.len();
        for running in &state.running {
            if running.token().cancel() {
                affected += 1;
            }
        }
        self.shared.publish_depths(&state);
        drop(state);

        for op in pending {
            op.mark_cancelled();
            self.shared
                .responses
                .submit(op, Outcome::Cancelled(CancelReason::CancelledBeforeStart));
        }
        affected
    }

    pub(crate) fn suspend(&self) -> bool {
        let mut state = self.shared.lock();
        let changed = !state.suspended;
        state.suspended = true;
        changed
    }

    pub(crate) fn resume(&self) -> bool {
        let mut state = self.shared.lock();
        let changed = state.suspended;
        state.suspended = false;
        drop(state);
        if changed {
            self.shared.available.notify_all();
        }
        changed
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.shared.lock().suspended
    }

    pub(crate) fn queued_len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub(crate) fn running_len(&self) -> usize {
        self.shared.lock().running.len()
    }

    /// Whether `id` is queued or running and not cancelled
    pub(crate) fn contains(&self, id: RequestId) -> bool {
        self.shared.lock().live().any(|op| op.id() == id)
    }
}

impl Drop for ExecutionQueue {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.shutdown = true;
        let pending: Vec<_> = state.pending.drain(..).collect();
        for running in &state.running {
            running.token().cancel();
        }
        drop(state);
        self.shared.available.notify_all();

        for op in pending {
            op.mark_cancelled();
            self.shared
                .responses
                .submit(op, Outcome::Cancelled(CancelReason::CancelledBeforeStart));
        }
        debug!("Execution queue shut down");
    }
}
