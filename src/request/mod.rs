//! # Request Module
//!
//! Types describing one outbound call before and after it is handed to the
//! [`Dispatcher`](crate::dispatcher::Dispatcher).
//!
//! ## Overview
//!
//! - [`HttpRequest`] - the data of a call: kind, method, path, query, headers,
//!   body, optional addressing overrides and its [`QueuingBehaviour`]
//! - [`RequestKind`] - explicit discriminant used for "same type" matching
//! - [`Addressing`] - scheme/host/port, merged with dispatcher defaults
//! - [`CancellationToken`] - cooperative cancel flag observed by workers and transports
//! - [`RequestHandle`] - returned by `enqueue`, used to observe and cancel a request
//!
//! ## Equality
//!
//! Two requests are *structurally equal* when kind, method, path, query,
//! headers, body and addressing all match. Identity ([`RequestId`]) is never
//! part of the comparison, which is what lets `CancelExistingEqual` find an
//! earlier copy of the same call.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::request::{HttpRequest, QueuingBehaviour};
//!
//! let req = HttpRequest::get("FetchFeed", "/v1/feed")
//!     .query("page", "2")
//!     .behaviour(QueuingBehaviour::CancelExistingOfSameType);
//!
//! assert_eq!(req.kind().as_str(), "FetchFeed");
//! assert!(req.addressing().is_unset());
//! ```

mod cancel;
mod handle;

pub use cancel::CancellationToken;
pub use handle::{RequestHandle, RequestState};
pub(crate) use handle::{Completion, Operation, OperationOwner};

use crate::ids::RequestId;
use crate::outcome::TransportError;
use http::Method;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Discriminant identifying which request variant an instance is
///
/// Compared by value; two requests share a kind when their tags are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKind(Arc<str>);

impl RequestKind {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestKind {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for RequestKind {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// Admission policy declared by each request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuingBehaviour {
    /// No de-duplication check
    #[default]
    Plain,
    /// Reject the new request if one of the same kind is queued or running
    CancelIfSameTypeExists,
    /// Cancel every queued or running request of the same kind, then admit
    CancelExistingOfSameType,
    /// Cancel every queued or running request structurally equal to this one, then admit
    CancelExistingEqual,
}

impl QueuingBehaviour {
    /// Parse a behaviour name (case-insensitive, `-` or `_` separated)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "plain" => Some(Self::Plain),
            "cancel_if_same_type_exists" => Some(Self::CancelIfSameTypeExists),
            "cancel_existing_of_same_type" => Some(Self::CancelExistingOfSameType),
            "cancel_existing_equal" => Some(Self::CancelExistingEqual),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::CancelIfSameTypeExists => "cancel_if_same_type_exists",
            Self::CancelExistingOfSameType => "cancel_existing_of_same_type",
            Self::CancelExistingEqual => "cancel_existing_equal",
        }
    }
}

impl fmt::Display for QueuingBehaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network addressing of a request or of a dispatcher's defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Addressing {
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Addressing {
    #[must_use]
    pub fn new(scheme: Option<&str>, host: Option<&str>, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.map(str::to_string),
            host: host.map(str::to_string),
            port,
        }
    }

    /// True when neither scheme nor host has been set
    ///
    /// A port alone does not count as an override.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.scheme.is_none() && self.host.is_none()
    }

    /// Copy `defaults` onto `self` when no scheme and no host are set.
    ///
    /// All-or-nothing: if either scheme or host is present nothing is merged,
    /// not even a missing port. Returns whether the defaults were applied.
    pub fn merge_defaults(&mut self, defaults: &Addressing) -> bool {
        if !self.is_unset() {
            return false;
        }
        self.scheme = defaults.scheme.clone();
        self.host = defaults.host.clone();
        self.port = defaults.port;
        true
    }
}

/// One outbound call
///
/// Built by the caller, mutated once by the dispatcher during admission
/// (addressing merge), then shared read-only with workers and the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    id: RequestId,
    kind: RequestKind,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
    addressing: Addressing,
    behaviour: QueuingBehaviour,
}

impl HttpRequest {
    pub fn new(kind: impl Into<RequestKind>, method: Method, path: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            kind: kind.into(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            addressing: Addressing::default(),
            behaviour: QueuingBehaviour::Plain,
        }
    }

    pub fn get(kind: impl Into<RequestKind>, path: impl Into<String>) -> Self {
        Self::new(kind, Method::GET, path)
    }

    pub fn post(kind: impl Into<RequestKind>, path: impl Into<String>) -> Self {
        Self::new(kind, Method::POST, path)
    }

    pub fn put(kind: impl Into<RequestKind>, path: impl Into<String>) -> Self {
        Self::new(kind, Method::PUT, path)
    }

    pub fn delete(kind: impl Into<RequestKind>, path: impl Into<String>) -> Self {
        Self::new(kind, Method::DELETE, path)
    }

    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value.to_string());
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn behaviour(mut self, behaviour: QueuingBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    #[must_use]
    pub fn scheme(mut self, scheme: &str) -> Self {
        self.addressing.scheme = Some(scheme.to_string());
        self
    }

    #[must_use]
    pub fn host(mut self, host: &str) -> Self {
        self.addressing.host = Some(host.to_string());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.addressing.port = Some(port);
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    pub(crate) fn addressing_mut(&mut self) -> &mut Addressing {
        &mut self.addressing
    }

    pub fn queuing_behaviour(&self) -> QueuingBehaviour {
        self.behaviour
    }

    /// Get a header by name (case-insensitive)
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }

    /// True when both requests share a kind
    #[must_use]
    pub fn same_kind(&self, other: &HttpRequest) -> bool {
        self.kind == other.kind
    }

    /// Render the fully-addressed URL.
    ///
    /// Requires a host. A missing scheme falls back to `https`.
    pub fn url(&self) -> Result<url::Url, TransportError> {
        let host = self
            .addressing
            .host
            .as_deref()
            .ok_or_else(|| TransportError::InvalidUrl {
                reason: format!("request {} has no host", self.kind),
            })?;
        let scheme = self.addressing.scheme.as_deref().unwrap_or("https");

        let mut url = url::Url::parse(&format!("{scheme}://{host}")).map_err(|e| {
            TransportError::InvalidUrl {
                reason: e.to_string(),
            }
        })?;
        if let Some(port) = self.addressing.port {
            url.set_port(Some(port))
                .map_err(|_| TransportError::InvalidUrl {
                    reason: format!("scheme '{scheme}' cannot carry a port"),
                })?;
        }
        url.set_path(&self.path);
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }
}

impl PartialEq for HttpRequest {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.method == other.method
            && self.path == other.path
            && self.query == other.query
            && self.headers == other.headers
            && self.body == other.body
            && self.addressing == other.addressing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structural_equality_ignores_identity() {
        let a = HttpRequest::get("FetchFeed", "/feed").query("page", "1");
        let b = HttpRequest::get("FetchFeed", "/feed").query("page", "1");
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn test_structural_equality_sees_body_and_query() {
        let a = HttpRequest::post("Login", "/login").json(json!({ "user": "a" }));
        let b = HttpRequest::post("Login", "/login").json(json!({ "user": "b" }));
        assert_ne!(a, b);
        assert!(a.same_kind(&b));

        let c = HttpRequest::get("FetchFeed", "/feed").query("page", "1");
        let d = HttpRequest::get("FetchFeed", "/feed").query("page", "2");
        assert_ne!(c, d);
    }

    #[test]
    fn test_behaviour_ignored_by_equality() {
        let a = HttpRequest::get("FetchFeed", "/feed");
        let b = HttpRequest::get("FetchFeed", "/feed").behaviour(QueuingBehaviour::CancelExistingEqual);
        assert_eq!(a, b);
    }

    #[test]
    fn test_queuing_behaviour_parse() {
        assert_eq!(QueuingBehaviour::parse("plain"), Some(QueuingBehaviour::Plain));
        assert_eq!(
            QueuingBehaviour::parse("Cancel-If-Same-Type-Exists"),
            Some(QueuingBehaviour::CancelIfSameTypeExists)
        );
        assert_eq!(
            QueuingBehaviour::parse("cancel_existing_of_same_type"),
            Some(QueuingBehaviour::CancelExistingOfSameType)
        );
        assert_eq!(
            QueuingBehaviour::parse("CANCEL_EXISTING_EQUAL"),
            Some(QueuingBehaviour::CancelExistingEqual)
        );
        assert_eq!(QueuingBehaviour::parse("bogus"), None);
    }

    #[test]
    fn test_merge_defaults_when_unset() {
        let defaults = Addressing::new(Some("https"), Some("api.example.com"), Some(443));
        let mut addr = Addressing::default();
        assert!(addr.merge_defaults(&defaults));
        assert_eq!(addr, defaults);
    }

    #[test]
    fn test_merge_defaults_is_all_or_nothing() {
        let defaults = Addressing::new(Some("https"), Some("api.example.com"), Some(443));

        let mut host_only = Addressing::new(None, Some("other.example.com"), None);
        assert!(!host_only.merge_defaults(&defaults));
        assert_eq!(host_only.scheme, None);
        assert_eq!(host_only.host.as_deref(), Some("other.example.com"));
        assert_eq!(host_only.port, None);

        let mut scheme_only = Addressing::new(Some("http"), None, None);
        assert!(!scheme_only.merge_defaults(&defaults));
        assert_eq!(scheme_only.host, None);
    }

    #[test]
    fn test_port_alone_is_not_an_override() {
        let defaults = Addressing::new(Some("https"), Some("api.example.com"), Some(443));
        let mut addr = Addressing::new(None, None, Some(8080));
        assert!(addr.merge_defaults(&defaults));
        assert_eq!(addr.port, Some(443));
    }

    #[test]
    fn test_url_rendering() {
        let req = HttpRequest::get("FetchFeed", "/v1/feed")
            .scheme("https")
            .host("api.example.com")
            .port(8443)
            .query("page", "2")
            .query("q", "a b");
        let url = req.url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com:8443/v1/feed?page=2&q=a+b"
        );
    }

    #[test]
    fn test_url_defaults_scheme_to_https() {
        let req = HttpRequest::get("Ping", "/ping").host("api.example.com");
        assert_eq!(req.url().unwrap().as_str(), "https://api.example.com/ping");
    }

    #[test]
    fn test_url_without_host_is_error() {
        let req = HttpRequest::get("Ping", "/ping");
        assert!(matches!(req.url(), Err(TransportError::InvalidUrl { .. })));
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut req = HttpRequest::get("Ping", "/ping").header("Authorization", "Bearer old");
        req.set_header("authorization", "Bearer new".to_string());
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.get_header("AUTHORIZATION"), Some("Bearer new"));
    }
}
