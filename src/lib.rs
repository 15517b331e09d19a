//! # brrtdispatch
//!
//! **brrtdispatch** is a client-side request dispatch layer. It sits
//! between application code and an HTTP transport, decides which requests may run,
//! runs them on a bounded pool of worker threads and hands every outcome to a single
//! ordered response worker.
//!
//! ## Overview
//!
//! - Requests declare their own admission policy ([`request::QueuingBehaviour`]):
//!   run unconditionally, give way to an active request of the same kind, replace
//!   every active request of the same kind, or replace structurally equal ones.
//! - Policy evaluation and insertion are one atomic step under the admission lock.
//! - An external [`auth::Authenticator`] can pause and resume all outbound traffic
//!   through a [`auth::PauseHandle`], e.g. while it refreshes a credential.
//! - Every request resolves exactly once to an [`outcome::Outcome`]: success,
//!   failure (passed through from the transport unchanged) or cancellation.
//!
//! ## Architecture
//!
//! - **[`request`]** - `HttpRequest`, kinds, queuing behaviours, cancellation, handles
//! - **[`policy`]** - Pure admission decision over a snapshot of active requests
//! - **[`queue`]** - Execution worker pool and the ordered response worker
//! - **[`dispatcher`]** - Addressing merge, admission, cancel surface, pause/resume
//! - **[`auth`]** - Authenticator trait, pause capability, bearer-token authenticator
//! - **[`transport`]** - Transport trait, interceptors, retry policy, `reqwest` transport
//! - **[`config`]** / **[`logging`]** - Ambient setup
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant App
//!     participant Dispatcher
//!     participant Exec as Execution Workers<br/>(N threads)
//!     participant Transport
//!     participant Resp as Response Worker<br/>(1 thread)
//!
//!     App->>Dispatcher: enqueue(request, completion)
//!     Dispatcher->>Dispatcher: merge default scheme/host/port
//!     Dispatcher->>Dispatcher: evaluate queuing behaviour
//!     alt Rejected / Evicted
//!         Dispatcher->>Resp: Cancelled(reason)
//!     end
//!     Dispatcher-->>App: RequestHandle
//!     Exec->>Exec: wait unless paused
//!     Exec->>Transport: execute(request, token)
//!     Transport-->>Exec: Result
//!     Exec->>Resp: Success / Failure / CancelledInFlight
//!     Resp->>App: completion(outcome)
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use brrtdispatch::dispatcher::Dispatcher;
//! use brrtdispatch::request::{HttpRequest, QueuingBehaviour};
//! use brrtdispatch::transport::ReqwestTransport;
//!
//! let dispatcher = Dispatcher::builder()
//!     .host("api.example.com")
//!     .build(ReqwestTransport::new().unwrap())
//!     .unwrap();
//!
//! let feed = HttpRequest::get("FetchFeed", "/v1/feed")
//!     .behaviour(QueuingBehaviour::CancelExistingOfSameType);
//! let handle = dispatcher.enqueue(feed, |outcome| {
//!     println!("feed: {}", outcome.label());
//! });
//! handle.cancel();
//! ```
//!
//! ## Runtime Considerations
//!
//! Execution workers and the response worker each own an OS thread. Transports
//! may block their worker thread; completions run one at a time on the response
//! thread and should stay short. Queue locks and channels come from `may::sync`,
//! so the dispatcher can be driven from `may` coroutines as well as from plain
//! threads. Worker stack size is configurable via `BRRTD_STACK_SIZE`.

pub mod auth;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod ids;
pub mod logging;
pub mod outcome;
pub mod policy;
pub mod queue;
pub mod request;
pub mod transport;

pub use auth::{Authenticator, BearerAuthenticator, GateState, PauseHandle, RequestGate};
pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use ids::RequestId;
pub use outcome::{CancelReason, Outcome, TransportError, TransportResponse};
pub use request::{
    Addressing, CancellationToken, HttpRequest, QueuingBehaviour, RequestHandle, RequestKind,
    RequestState,
};
pub use transport::{Interceptor, ReqwestTransport, RetryPolicy, Transport};
