//! # Transport Module
//!
//! The dispatcher never touches the network itself. Execution workers hand a
//! fully addressed [`HttpRequest`] to a [`Transport`] together with the
//! request's [`CancellationToken`], and whatever comes back is routed to the
//! response queue unchanged.
//!
//! ## Contract
//!
//! - `execute` runs on a dedicated execution worker thread and may block it.
//! - The token must be checked before starting and should be polled while
//!   waiting. Once it is set the transport should return as soon as it can;
//!   whatever it returns is then reported as a cancellation.
//! - Retries and request adaptation are expressed through [`Interceptor`]s,
//!   which transports apply around each attempt.
//!
//! Any `Fn(&HttpRequest, &CancellationToken) -> Result<..>` closure is a
//! transport, which keeps test doubles short.

mod reqwest_transport;
mod retry;

pub use reqwest_transport::{ReqwestTransport, ReqwestTransportBuilder};
pub use retry::RetryPolicy;

use crate::outcome::{TransportError, TransportResponse};
use crate::request::{CancellationToken, HttpRequest};
use may::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

/// How often a waiting worker looks at the cancellation token
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Performs the network exchange for one request
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: &HttpRequest,
        token: &CancellationToken,
    ) -> Result<TransportResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest, &CancellationToken) -> Result<TransportResponse, TransportError>
        + Send
        + Sync,
{
    fn execute(
        &self,
        request: &HttpRequest,
        token: &CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        self(request, token)
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up and report the error
    DoNotRetry,
    /// Try again immediately
    Retry,
    /// Try again after the given delay
    RetryAfter(Duration),
}

/// Hook applied by a transport around each attempt
pub trait Interceptor: Send + Sync {
    /// Adjust the request before it is sent
    fn adapt(&self, _request: &mut HttpRequest) {}

    /// Decide whether a failed attempt should be repeated.
    /// `attempt` counts from 1 for the first try.
    fn retry(&self, _request: &HttpRequest, _error: &TransportError, _attempt: u32) -> RetryDecision {
        RetryDecision::DoNotRetry
    }
}

/// Run `attempt` with `interceptors` applied, repeating while any interceptor asks for it.
///
/// The token is checked before every attempt; a cancelled request is never re-sent.
pub fn execute_with_interceptors<A>(
    request: &HttpRequest,
    token: &CancellationToken,
    interceptors: &[Box<dyn Interceptor>],
    mut attempt: A,
) -> Result<TransportResponse, TransportError>
where
    A: FnMut(&HttpRequest) -> Result<TransportResponse, TransportError>,
{
    let mut adapted = request.clone();
    for interceptor in interceptors {
        interceptor.adapt(&mut adapted);
    }

    let mut tries = 0u32;
    loop {
        if token.is_cancelled() {
            return Err(cancelled());
        }
        tries += 1;
        let err = match attempt(&adapted) {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        let decision = interceptors
            .iter()
            .map(|i| i.retry(&adapted, &err, tries))
            .find(|d| *d != RetryDecision::DoNotRetry)
            .unwrap_or(RetryDecision::DoNotRetry);

        match decision {
            RetryDecision::DoNotRetry => return Err(err),
            RetryDecision::Retry => {
                tracing::debug!(request_id = %request.id(), attempt = tries, error = %err, "Retrying request");
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::debug!(
                    request_id = %request.id(),
                    attempt = tries,
                    delay = ?delay,
                    error = %err,
                    "Retrying request after delay"
                );
                sleep_unless_cancelled(token, delay);
            }
        }
    }
}

fn cancelled() -> TransportError {
    TransportError::Other {
        message: "request cancelled".to_string(),
    }
}

/// Sleep for `delay` in short slices. Returns `false` as soon as `token` is cancelled.
pub fn sleep_unless_cancelled(token: &CancellationToken, delay: Duration) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if token.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        may::coroutine::sleep(CANCEL_POLL_INTERVAL.min(deadline - now));
    }
}

/// Run a blocking exchange on its own thread and wait for it, giving up once
/// `token` is cancelled.
///
/// The caller's worker is released within [`CANCEL_POLL_INTERVAL`] of the
/// cancellation. The abandoned exchange finishes in the background and its
/// result is dropped, so `exchange` should carry its own timeout.
pub fn run_cancellable<F>(
    token: &CancellationToken,
    exchange: F,
) -> Result<TransportResponse, TransportError>
where
    F: FnOnce() -> Result<TransportResponse, TransportError> + Send + 'static,
{
    if token.is_cancelled() {
        return Err(cancelled());
    }

    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("brrtdispatch-exchange".to_string())
        .spawn(move || {
            // The receiver is gone when the request was cancelled meanwhile.
            let _ = tx.send(exchange());
        })
        .map_err(|e| TransportError::Other {
            message: format!("failed to spawn exchange thread: {e}"),
        })?;

    loop {
        match rx.recv_timeout(CANCEL_POLL_INTERVAL) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) if token.is_cancelled() => {
                tracing::debug!("Abandoning in-flight exchange after cancellation");
                return Err(cancelled());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(TransportError::Other {
                    message: "exchange thread exited without a result".to_string(),
                })
            }
        }
    }
}
