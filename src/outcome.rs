//! # Outcome Module
//!
//! Every enqueued request resolves to exactly one [`Outcome`], delivered through
//! its completion closure on the response-processing worker. Success, transport
//! failure and every flavour of cancellation travel the same channel, so callers
//! handle them uniformly.
//!
//! The dispatch layer never raises errors of its own: a request rejected by its
//! queuing behaviour, evicted by a newer request, or cancelled while running is a
//! [`CancelReason`], not an error. [`TransportError`] values are produced by the
//! [`Transport`](crate::transport::Transport) and passed through unchanged.

use http::StatusCode;
use serde_json::Value;
use std::fmt;

/// Raw response produced by a transport for a completed exchange
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers in the order the transport received them
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Vec<u8>,
}

impl TransportResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// Get a header by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body as JSON
    pub fn json(&self) -> Result<Value, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Decode {
            message: e.to_string(),
        })
    }

    /// Body as UTF-8 text, lossily converted
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level failure, opaque to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established
    Connect { message: String },
    /// The exchange exceeded the transport's timeout
    Timeout,
    /// The server answered with a non-success status
    Status { status: u16, body: String },
    /// No usable URL could be built from the request's addressing
    InvalidUrl { reason: String },
    /// The response body could not be decoded
    Decode { message: String },
    /// Anything else reported by the transport
    Other { message: String },
}

impl TransportError {
    /// HTTP status carried by the error, if the server answered at all
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect { message } => write!(f, "connection failed: {}", message),
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Status { status, body } => {
                write!(f, "server responded with status {}: {}", status, body)
            }
            TransportError::InvalidUrl { reason } => write!(f, "invalid request url: {}", reason),
            TransportError::Decode { message } => {
                write!(f, "failed to decode response body: {}", message)
            }
            TransportError::Other { message } => write!(f, "transport error: {}", message),
        }
    }
}

impl std::error::Error for TransportError {}

/// Why a request ended without its response being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// `CancelIfSameTypeExists` found a request of the same kind; never ran
    RejectedByPolicy,
    /// Cancelled by a newer request's `CancelExistingOfSameType` or `CancelExistingEqual`
    Evicted,
    /// Cancelled while its transport exchange was running
    CancelledInFlight,
    /// Cancelled while still waiting in the execution queue
    CancelledBeforeStart,
    /// Its completed response was dropped by `cancel_all_operations`
    Discarded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancelReason::RejectedByPolicy => "rejected by queuing behaviour",
            CancelReason::Evicted => "evicted by a newer request",
            CancelReason::CancelledInFlight => "cancelled in flight",
            CancelReason::CancelledBeforeStart => "cancelled before start",
            CancelReason::Discarded => "response discarded",
        };
        f.write_str(s)
    }
}

/// Terminal result of one request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(TransportResponse),
    Failure(TransportError),
    Cancelled(CancelReason),
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled(_))
    }

    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Outcome::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }

    /// HTTP status of a success or a status failure
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Success(resp) => Some(resp.status.as_u16()),
            Outcome::Failure(err) => err.status(),
            Outcome::Cancelled(_) => None,
        }
    }

    /// Short label used in log fields
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Failure(_) => "failure",
            Outcome::Cancelled(_) => "cancelled",
        }
    }
}

impl From<Result<TransportResponse, TransportError>> for Outcome {
    fn from(result: Result<TransportResponse, TransportError>) -> Self {
        match result {
            Ok(resp) => Outcome::Success(resp),
            Err(err) => Outcome::Failure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_status_from_success_and_failure() {
        let ok = Outcome::Success(TransportResponse::new(StatusCode::CREATED, Vec::new()));
        assert_eq!(ok.status(), Some(201));

        let failed = Outcome::Failure(TransportError::Status {
            status: 503,
            body: "busy".into(),
        });
        assert_eq!(failed.status(), Some(503));

        let cancelled = Outcome::Cancelled(CancelReason::Evicted);
        assert_eq!(cancelled.status(), None);
        assert_eq!(cancelled.cancel_reason(), Some(CancelReason::Evicted));
    }

    #[test]
    fn test_transport_response_json_and_headers() {
        let mut resp = TransportResponse::new(StatusCode::OK, br#"{"ok":true}"#.to_vec());
        resp.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        assert_eq!(resp.header("content-type"), Some("application/json"));
        assert_eq!(resp.json().unwrap(), serde_json::json!({ "ok": true }));
    }

    #[test]
    fn test_transport_response_bad_json_is_decode_error() {
        let resp = TransportResponse::new(StatusCode::OK, b"<html>".to_vec());
        assert!(matches!(resp.json(), Err(TransportError::Decode { .. })));
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::InvalidUrl {
            reason: "missing host".into(),
        };
        assert_eq!(err.to_string(), "invalid request url: missing host");
        assert_eq!(TransportError::Timeout.to_string(), "request timed out");
    }

    #[test]
    fn test_outcome_from_result() {
        let outcome: Outcome = Err(TransportError::Timeout).into();
        assert_eq!(outcome, Outcome::Failure(TransportError::Timeout));
        assert_eq!(outcome.label(), "failure");
    }
}
