use super::{CancellationToken, HttpRequest, RequestKind};
use crate::ids::RequestId;
use crate::outcome::Outcome;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Completion closure run once on the response-processing worker
pub(crate) type Completion = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Lifecycle of an enqueued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Built but not yet admitted
    Created,
    /// Admitted, waiting for a worker
    Queued,
    /// Transport exchange in progress
    Running,
    /// Completion delivered with a success or failure
    Finished,
    /// Rejected, evicted, withdrawn, cancelled in flight or discarded
    Cancelled,
}

impl RequestState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Queued,
            2 => Self::Running,
            3 => Self::Finished,
            _ => Self::Cancelled,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Queued => 1,
            Self::Running => 2,
            Self::Finished => 3,
            Self::Cancelled => 4,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// Receiving side of a request's back-reference, implemented by the dispatcher
pub(crate) trait OperationOwner: Send + Sync {
    /// Pull a still-queued operation out of the execution queue and resolve it
    fn withdraw(&self, op: &Arc<Operation>);
}

/// An admitted request together with its cancellation and completion state
pub(crate) struct Operation {
    request: HttpRequest,
    token: CancellationToken,
    state: AtomicU8,
    completion: Mutex<Option<Completion>>,
    owner: OnceLock<Weak<dyn OperationOwner>>,
}

impl Operation {
    pub(crate) fn new(request: HttpRequest, completion: Completion) -> Arc<Self> {
        Arc::new(Self {
            request,
            token: CancellationToken::new(),
            state: AtomicU8::new(RequestState::Created.as_u8()),
            completion: Mutex::new(Some(completion)),
            owner: OnceLock::new(),
        })
    }

    pub(crate) fn id(&self) -> RequestId {
        self.request.id()
    }

    pub(crate) fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn state(&self) -> RequestState {
        RequestState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Assign the owning dispatcher. Only the first call has any effect.
    pub(crate) fn bind_owner(&self, owner: Weak<dyn OperationOwner>) {
        let _ = self.owner.set(owner);
    }

    pub(crate) fn mark_queued(&self) {
        let _ = self.state.compare_exchange(
            RequestState::Created.as_u8(),
            RequestState::Queued.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Move `Queued -> Running`. Fails once the request has been cancelled.
    pub(crate) fn try_start(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.state
            .compare_exchange(
                RequestState::Queued.as_u8(),
                RequestState::Running.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Flag the request cancelled and record the terminal state
    pub(crate) fn mark_cancelled(&self) {
        self.token.cancel();
        self.state
            .store(RequestState::Cancelled.as_u8(), Ordering::Release);
    }

    /// Record the terminal state matching `outcome` and hand back the
    /// completion closure. Returns `None` when it was already taken.
    pub(crate) fn settle(&self, outcome: &Outcome) -> Option<Completion> {
        let terminal = if outcome.is_cancelled() {
            self.token.cancel();
            RequestState::Cancelled
        } else {
            RequestState::Finished
        };
        let completion = self.completion.lock().take();
        if completion.is_some() {
            self.state.store(terminal.as_u8(), Ordering::Release);
        }
        completion
    }

    fn owner(&self) -> Option<Arc<dyn OperationOwner>> {
        self.owner.get().and_then(|owner| owner.upgrade())
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id())
            .field("kind", self.request.kind())
            .field("state", &self.state())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

/// Caller-side view of an enqueued request
///
/// Cheap to clone. Cancelling through the handle is cooperative: a queued
/// request is withdrawn immediately, a running one is flagged and resolves as
/// [`CancelReason::CancelledInFlight`](crate::outcome::CancelReason) once its
/// transport returns.
#[derive(Clone)]
pub struct RequestHandle {
    op: Arc<Operation>,
}

impl RequestHandle {
    pub(crate) fn new(op: Arc<Operation>) -> Self {
        Self { op }
    }

    pub fn id(&self) -> RequestId {
        self.op.id()
    }

    pub fn kind(&self) -> &RequestKind {
        self.op.request().kind()
    }

    /// The request as admitted, after the addressing merge
    pub fn request(&self) -> &HttpRequest {
        self.op.request()
    }

    pub fn state(&self) -> RequestState {
        self.op.state()
    }

    pub fn is_cancelled(&self) -> bool {
        self.op.token().is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.op.token().clone()
    }

    /// Cancel this request
    pub fn cancel(&self) {
        if self.op.state().is_terminal() {
            return;
        }
        self.op.token().cancel();
        if let Some(owner) = self.op.owner() {
            owner.withdraw(&self.op);
        }
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RequestHandle").field(&self.op).finish()
    }
}
