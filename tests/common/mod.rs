#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use brrtdispatch::{
    CancellationToken, Dispatcher, HttpRequest, Outcome, Transport, TransportError,
    TransportResponse,
};
use http::StatusCode;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// What the mock transport saw for one attempt
#[derive(Debug, Clone)]
pub struct Seen {
    pub key: String,
    pub url: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct MockInner {
    held: Mutex<HashSet<String>>,
    seen: Mutex<Vec<Seen>>,
    statuses: Mutex<HashMap<String, u16>>,
}

/// Scripted transport keyed by `path?query`.
///
/// Held keys block the worker until released or cancelled.
/// Everything else answers `200` with the key as body unless a status was scripted.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

pub fn key_of(request: &HttpRequest) -> String {
    let mut key = request.path().to_string();
    for (i, (k, v)) in request.query_pairs().iter().enumerate() {
        key.push(if i == 0 { '?' } else { '&' });
        key.push_str(k);
        key.push('=');
        key.push_str(v);
    }
    key
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self, key: &str) {
        self.inner.held.lock().insert(key.to_string());
    }

    pub fn release(&self, key: &str) {
        self.inner.held.lock().remove(key);
    }

    pub fn respond_with(&self, key: &str, status: u16) {
        self.inner.statuses.lock().insert(key.to_string(), status);
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.inner.seen.lock().clone()
    }

    pub fn seen_keys(&self) -> Vec<String> {
        self.seen().into_iter().map(|s| s.key).collect()
    }

    pub fn started(&self, key: &str) -> bool {
        self.inner.seen.lock().iter().any(|s| s.key == key)
    }

    /// Block the test thread until `key` reached the transport
    pub fn wait_started(&self, key: &str) -> bool {
        wait_until(|| self.started(key))
    }
}

impl Transport for MockTransport {
    fn execute(
        &self,
        request: &HttpRequest,
        token: &CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        let key = key_of(request);
        self.inner.seen.lock().push(Seen {
            key: key.clone(),
            url: request.url().ok().map(|u| u.to_string()),
            authorization: request.get_header("Authorization").map(str::to_string),
        });

        while self.inner.held.lock().contains(&key) {
            if token.is_cancelled() {
                return Err(TransportError::Other {
                    message: "aborted".to_string(),
                });
            }
            may::coroutine::sleep(Duration::from_millis(5));
        }

        let status = self.inner.statuses.lock().get(&key).copied();
        match status {
            Some(code) if !(200..300).contains(&code) => Err(TransportError::Status {
                status: code,
                body: String::new(),
            }),
            Some(code) => Ok(TransportResponse::new(
                StatusCode::from_u16(code).unwrap(),
                key.into_bytes(),
            )),
            None => Ok(TransportResponse::new(StatusCode::OK, key.into_bytes())),
        }
    }
}

/// Collects `(tag, outcome)` pairs from completions
pub struct Outcomes {
    tx: mpsc::Sender<(String, Outcome)>,
    rx: mpsc::Receiver<(String, Outcome)>,
}

impl Outcomes {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn completion(&self, tag: &str) -> impl FnOnce(Outcome) + Send + 'static {
        let tx = self.tx.clone();
        let tag = tag.to_string();
        move |outcome| {
            let _ = tx.send((tag, outcome));
        }
    }

    pub fn next(&self) -> (String, Outcome) {
        self.rx
            .recv_timeout(TIMEOUT)
            .expect("timed out waiting for a completion")
    }

    /// Wait for `n` completions, keyed by tag
    pub fn collect(&self, n: usize) -> HashMap<String, Outcome> {
        (0..n).map(|_| self.next()).collect()
    }

    pub fn assert_quiet(&self, window: Duration) {
        if let Ok((tag, outcome)) = self.rx.recv_timeout(window) {
            panic!("unexpected completion for {tag}: {outcome:?}");
        }
    }
}

pub fn dispatcher(transport: &MockTransport, workers: usize) -> Dispatcher {
    Dispatcher::builder()
        .host("api.example.com")
        .port(443)
        .max_concurrent(workers)
        .build(transport.clone())
        .expect("dispatcher starts")
}

pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
