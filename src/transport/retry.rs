use super::{Interceptor, RetryDecision};
use crate::outcome::TransportError;
use crate::request::HttpRequest;
use http::Method;
use std::time::Duration;

/// Status codes worth a second attempt
const RETRYABLE_STATUSES: [u16; 5] = [408, 500, 502, 503, 504];

/// Fixed-delay retry interceptor
///
/// Retries connection failures, timeouts and the usual transient statuses
/// (408, 500, 502, 503, 504) up to `limit` extra attempts. Idempotent methods
/// are retryable, and so is POST by default.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    limit: u32,
    delay: Duration,
    methods: Vec<Method>,
}

impl RetryPolicy {
    pub fn new(limit: u32, delay: Duration) -> Self {
        Self {
            limit,
            delay,
            methods: vec![
                Method::GET,
                Method::HEAD,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
                Method::TRACE,
                Method::POST,
            ],
        }
    }

    /// Restrict retries to the given methods
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_retryable_method(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    fn is_retryable_error(error: &TransportError) -> bool {
        match error {
            TransportError::Connect { .. } | TransportError::Timeout => true,
            TransportError::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            _ => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}

impl Interceptor for RetryPolicy {
    fn retry(&self, request: &HttpRequest, error: &TransportError, attempt: u32) -> RetryDecision {
        if attempt > self.limit
            || !self.is_retryable_method(request.method())
            || !Self::is_retryable_error(error)
        {
            return RetryDecision::DoNotRetry;
        }
        if self.delay.is_zero() {
            RetryDecision::Retry
        } else {
            RetryDecision::RetryAfter(self.delay)
        }
    }
}
