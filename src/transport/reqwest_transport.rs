use super::{execute_with_interceptors, run_cancellable, Interceptor, Transport};
use crate::outcome::{TransportError, TransportResponse};
use crate::request::{CancellationToken, HttpRequest};
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// [`Transport`] backed by a blocking `reqwest` client
///
/// Each attempt runs on its own thread while the execution worker waits on it
/// and watches the request's token. Cancelling an in-flight request frees the
/// worker within [`CANCEL_POLL_INTERVAL`](super::CANCEL_POLL_INTERVAL); the
/// abandoned exchange is left to finish or time out in the background.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl ReqwestTransport {
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Transport with the default timeout and no interceptors
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }
}

fn send_once(
    client: &reqwest::blocking::Client,
    request: &HttpRequest,
) -> Result<TransportResponse, TransportError> {
    let url = request.url()?;
    debug!(
        request_id = %request.id(),
        method = %request.method(),
        url = %url,
        "Sending request"
    );

    let mut builder = client.request(request.method().clone(), url);
    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body() {
        builder = builder.json(body);
    }

    let response = builder.send().map_err(map_reqwest_error)?;
    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let body = response.bytes().map_err(map_reqwest_error)?.to_vec();

    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    Ok(TransportResponse {
        status,
        headers,
        body,
    })
}

impl Transport for ReqwestTransport {
    fn execute(
        &self,
        request: &HttpRequest,
        token: &CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        execute_with_interceptors(request, token, &self.interceptors, |req| {
            let client = self.client.clone();
            let req = req.clone();
            run_cancellable(token, move || send_once(&client, &req))
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect {
            message: err.to_string(),
        }
    } else if err.is_decode() {
        TransportError::Decode {
            message: err.to_string(),
        }
    } else {
        TransportError::Other {
            message: err.to_string(),
        }
    }
}

/// Builder for [`ReqwestTransport`]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            user_agent: None,
            interceptors: Vec::new(),
        }
    }
}

impl ReqwestTransportBuilder {
    /// Per-exchange timeout, covering connect through body read
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Append an interceptor. Interceptors run in insertion order.
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, TransportError> {
        let mut builder = reqwest::blocking::Client::builder().timeout(self.timeout);
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build().map_err(|e| TransportError::Other {
            message: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(ReqwestTransport {
            client,
            interceptors: self.interceptors,
        })
    }
}
