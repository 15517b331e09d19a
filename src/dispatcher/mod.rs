//! # Dispatcher Module
//!
//! The dispatcher sits between application code and an HTTP [`Transport`](crate::transport::Transport).
//! It accepts requests, applies their admission policy against the requests
//! already in flight, executes them on a bounded pool of worker threads and
//! runs their completions, in order, on one dedicated response thread.
//!
//! ## Request Flow
//!
//! 1. `enqueue` takes the admission lock
//! 2. Default scheme/host/port are merged into requests that carry neither scheme nor host
//! 3. The admission policy is evaluated against the live queued/running set
//!    (reject, evict-then-admit or admit), atomically with the insertion
//! 4. An execution worker picks the request up unless the dispatcher is paused,
//!    authorizes it and runs it against the transport
//! 5. The outcome is handed to the response worker, which runs the completion
//!
//! ## Cancellation
//!
//! - [`RequestHandle::cancel`](crate::request::RequestHandle::cancel) withdraws
//!   a queued request or flags a running one
//! - [`Dispatcher::cancel_all_requests`] cancels everything queued or running and
//!   leaves the response worker alone
//! - [`Dispatcher::cancel_all_operations`] additionally discards response work
//!   that has not run yet
//!
//! ## Pause / Resume
//!
//! The dispatcher implements [`RequestGate`](crate::auth::RequestGate). Pausing
//! stops workers from starting queued requests; running requests finish and
//! response processing continues.
//!
//! ```rust,no_run
//! use brrtdispatch::dispatcher::Dispatcher;
//! use brrtdispatch::request::{HttpRequest, QueuingBehaviour};
//! use brrtdispatch::transport::ReqwestTransport;
//!
//! let transport = ReqwestTransport::new().unwrap();
//! let dispatcher = Dispatcher::builder()
//!     .host("api.example.com")
//!     .port(443)
//!     .build(transport)
//!     .unwrap();
//!
//! let login = HttpRequest::post("Login", "/login")
//!     .behaviour(QueuingBehaviour::CancelIfSameTypeExists);
//! dispatcher.enqueue(login, |outcome| println!("login: {}", outcome.label()));
//! ```

mod core;

pub use self::core::{Dispatcher, DispatcherBuilder};
