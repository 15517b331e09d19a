use crate::auth::{Authenticator, GateState, PauseHandle, RequestGate};
use crate::config::DispatcherConfig;
use crate::ids::RequestId;
use crate::outcome::Outcome;
use crate::policy::Verdict;
use crate::queue::{ExecutionConfig, ExecutionQueue, QueueMetrics, ResponseQueue};
use crate::request::{Addressing, HttpRequest, Operation, OperationOwner, RequestHandle};
use crate::transport::Transport;
use may::sync::{Mutex, MutexGuard};
use std::fmt;
use std::io;
use std::sync::{Arc, PoisonError, Weak};
use tracing::{debug, info};

struct DispatcherShared {
    /// Admission lock: default addressing, held across merge and admission
    defaults: Mutex<Addressing>,
    execution: ExecutionQueue,
    responses: ResponseQueue,
    metrics: Arc<QueueMetrics>,
    has_authenticator: bool,
}

impl DispatcherShared {
    fn lock_defaults(&self) -> MutexGuard<'_, Addressing> {
        self.defaults.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OperationOwner for DispatcherShared {
    fn withdraw(&self, op: &Arc<Operation>) {
        self.execution.withdraw(op);
    }
}

impl RequestGate for DispatcherShared {
    fn pause_requests(&self) {
        if self.execution.suspend() {
            info!(
                queued = self.execution.queued_len(),
                running = self.execution.running_len(),
                "Requests paused"
            );
        }
    }

    fn resume_requests(&self) {
        if self.execution.resume() {
            info!(queued = self.execution.queued_len(), "Requests resumed");
        }
    }

    fn gate_state(&self) -> GateState {
        if self.execution.is_suspended() {
            GateState::Paused
        } else {
            GateState::Running
        }
    }
}

/// Client-side request dispatcher
///
/// Owns default addressing, an execution queue of bounded concurrency and a
/// single ordered response worker. Cheap to clone; clones share everything.
///
/// Every enqueued request gets exactly one [`Outcome`], delivered to its
/// completion on the response worker, whether it succeeded, failed, was
/// rejected, evicted or cancelled.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<DispatcherShared>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Dispatcher without an authenticator
    pub fn new<T>(config: DispatcherConfig, transport: T) -> io::Result<Self>
    where
        T: Transport + 'static,
    {
        Self::builder().config(config).build(transport)
    }

    /// Merge the default addressing into `request` and admit it.
    ///
    /// Merge and policy evaluation run under the admission lock, so concurrent
    /// `enqueue` calls and addressing changes are serialized. The completion
    /// runs exactly once on the response worker.
    pub fn enqueue<F>(&self, mut request: HttpRequest, completion: F) -> RequestHandle
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let defaults = self.shared.lock_defaults();
        merge_into(&mut request, &defaults);

        info!(
            request_id = %request.id(),
            kind = %request.kind(),
            behaviour = %request.queuing_behaviour(),
            method = %request.method(),
            path = %request.path(),
            "Enqueuing request"
        );

        let op = Operation::new(request, Box::new(completion));
        let shared: Weak<DispatcherShared> = Arc::downgrade(&self.shared);
        let owner: Weak<dyn OperationOwner> = shared;
        op.bind_owner(owner);

        let verdict = self.shared.execution.admit(Arc::clone(&op));
        drop(defaults);

        if let Verdict::EvictThenAdmit(ids) = &verdict {
            debug!(request_id = %op.id(), evicted = ?ids, "Admitted after eviction");
        }
        RequestHandle::new(op)
    }

    /// Apply the default addressing to `request` if it has neither scheme nor host.
    /// Returns whether defaults were applied.
    pub fn prepare_request(&self, request: &mut HttpRequest) -> bool {
        let defaults = self.shared.lock_defaults();
        merge_into(request, &defaults)
    }

    /// Cancel every queued and running request. Responses already handed to
    /// the response worker still run their completions normally.
    pub fn cancel_all_requests(&self) -> usize {
        let affected = self.shared.execution.cancel_all();
        info!(affected = affected, "Cancelled all requests");
        affected
    }

    /// Cancel every queued and running request and discard pending response work.
    ///
    /// Successes and failures already waiting on the response worker resolve as
    /// [`CancelReason::Discarded`](crate::outcome::CancelReason::Discarded).
    pub fn cancel_all_operations(&self) -> usize {
        let affected = self.shared.execution.cancel_all();
        let generation = self.shared.responses.cancel_all();
        info!(
            affected = affected,
            generation = generation,
            "Cancelled all operations"
        );
        affected
    }

    /// Stop starting queued requests. Running requests finish normally.
    pub fn pause_requests(&self) {
        self.shared.pause_requests();
    }

    pub fn resume_requests(&self) {
        self.shared.resume_requests();
    }

    pub fn gate_state(&self) -> GateState {
        self.shared.gate_state()
    }

    /// A `{pause, resume}` capability that does not keep the dispatcher alive
    pub fn pause_handle(&self) -> PauseHandle {
        let shared: Weak<DispatcherShared> = Arc::downgrade(&self.shared);
        let gate: Weak<dyn RequestGate> = shared;
        PauseHandle::new(gate)
    }

    pub fn defaults(&self) -> Addressing {
        self.shared.lock_defaults().clone()
    }

    pub fn scheme(&self) -> Option<String> {
        self.shared.lock_defaults().scheme.clone()
    }

    pub fn host(&self) -> Option<String> {
        self.shared.lock_defaults().host.clone()
    }

    pub fn port(&self) -> Option<u16> {
        self.shared.lock_defaults().port
    }

    pub fn set_scheme(&self, scheme: Option<&str>) {
        self.shared.lock_defaults().scheme = scheme.map(str::to_string);
    }

    pub fn set_host(&self, host: Option<&str>) {
        self.shared.lock_defaults().host = host.map(str::to_string);
    }

    pub fn set_port(&self, port: Option<u16>) {
        self.shared.lock_defaults().port = port;
    }

    pub fn metrics(&self) -> &Arc<QueueMetrics> {
        &self.shared.metrics
    }

    pub fn execution_config(&self) -> &ExecutionConfig {
        self.shared.execution.config()
    }

    pub fn queued_len(&self) -> usize {
        self.shared.execution.queued_len()
    }

    pub fn running_len(&self) -> usize {
        self.shared.execution.running_len()
    }

    /// Whether the request is queued or running and not cancelled
    pub fn is_active(&self, id: RequestId) -> bool {
        self.shared.execution.contains(id)
    }
}

impl RequestGate for Dispatcher {
    fn pause_requests(&self) {
        self.shared.pause_requests();
    }

    fn resume_requests(&self) {
        self.shared.resume_requests();
    }

    fn gate_state(&self) -> GateState {
        self.shared.gate_state()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("defaults", &self.defaults())
            .field("gate", &self.gate_state())
            .field("queued", &self.queued_len())
            .field("running", &self.running_len())
            .field("authenticator", &self.shared.has_authenticator)
            .finish()
    }
}

fn merge_into(request: &mut HttpRequest, defaults: &Addressing) -> bool {
    let applied = request.addressing_mut().merge_defaults(defaults);
    if applied {
        debug!(request_id = %request.id(), "Applied default addressing");
    }
    applied
}

/// Builder for [`Dispatcher`]
#[derive(Default)]
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl DispatcherBuilder {
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scheme(mut self, scheme: &str) -> Self {
        self.config.scheme = Some(scheme.to_string());
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.config.host = Some(host.to_string());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    pub fn execution(mut self, execution: ExecutionConfig) -> Self {
        self.config.execution = execution;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.execution.max_concurrent = max_concurrent;
        self
    }

    /// Authenticator to attach. It receives the dispatcher's [`PauseHandle`] during `build`.
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Spawn the response worker and the execution workers
    pub fn build<T>(self, transport: T) -> io::Result<Dispatcher>
    where
        T: Transport + 'static,
    {
        let Self {
            config,
            authenticator,
        } = self;
        let metrics = Arc::new(QueueMetrics::new());

        let responses = ResponseQueue::start(
            config.execution.stack_size,
            authenticator.clone(),
            Arc::clone(&metrics),
        )?;
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let execution = ExecutionQueue::start(
            config.execution.clone(),
            transport,
            authenticator.clone(),
            responses.sender(),
            Arc::clone(&metrics),
        )?;

        let shared = Arc::new(DispatcherShared {
            defaults: Mutex::new(config.defaults()),
            execution,
            responses,
            metrics,
            has_authenticator: authenticator.is_some(),
        });
        let dispatcher = Dispatcher { shared };

        if let Some(auth) = authenticator {
            auth.attach(dispatcher.pause_handle());
        }

        info!(
            scheme = ?config.scheme,
            host = ?config.host,
            port = ?config.port,
            workers = config.execution.max_concurrent,
            "Dispatcher started"
        );
        Ok(dispatcher)
    }
}
