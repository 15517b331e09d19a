use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for the execution and response-processing queues
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Requests inserted into the execution queue
    pub admitted_count: AtomicU64,
    /// Requests rejected by `CancelIfSameTypeExists`
    pub rejected_count: AtomicU64,
    /// Requests cancelled by a newer request's queuing behaviour
    pub evicted_count: AtomicU64,
    /// Requests whose completion ran with a success or failure
    pub completed_count: AtomicU64,
    /// Requests whose completion ran with a cancellation
    pub cancelled_count: AtomicU64,
    /// Completions submitted but not yet run (approximate)
    pub response_depth: AtomicUsize,
    /// Requests admitted and waiting for a worker
    pub queued_depth: AtomicUsize,
    /// Requests whose transport exchange is in progress
    pub running_depth: AtomicUsize,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admission(&self) {
        self.admitted_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, n: usize) {
        self.evicted_count.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn record_response_submitted(&self) {
        self.response_depth.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completion that was run
    pub fn record_response_processed(&self, cancelled: bool) {
        self.response_depth.fetch_sub(1, Ordering::Relaxed);
        if cancelled {
            self.cancelled_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.completed_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a submitted completion that had already been delivered
    pub fn record_response_skipped(&self) {
        self.response_depth.fetch_sub(1, Ordering::Relaxed);
    }

    /// Publish the execution queue's current sizes
    pub fn set_depths(&self, queued: usize, running: usize) {
        self.queued_depth.store(queued, Ordering::Relaxed);
        self.running_depth.store(running, Ordering::Relaxed);
    }

    pub fn get_admitted_count(&self) -> u64 {
        self.admitted_count.load(Ordering::Relaxed)
    }

    pub fn get_rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    pub fn get_evicted_count(&self) -> u64 {
        self.evicted_count.load(Ordering::Relaxed)
    }

    pub fn get_completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }

    pub fn get_cancelled_count(&self) -> u64 {
        self.cancelled_count.load(Ordering::Relaxed)
    }

    pub fn get_response_depth(&self) -> usize {
        self.response_depth.load(Ordering::Relaxed)
    }

    pub fn get_queued_depth(&self) -> usize {
        self.queued_depth.load(Ordering::Relaxed)
    }

    pub fn get_running_depth(&self) -> usize {
        self.running_depth.load(Ordering::Relaxed)
    }
}
