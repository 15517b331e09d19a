use std::fmt::{Display, Formatter};
use std::time::{Duration, SystemTime};

/// Identity of one enqueued request, backed by ULID.
///
/// Assigned when an [`HttpRequest`](crate::request::HttpRequest) is built and
/// carried through admission, execution and response processing so every log
/// line for the same request can be correlated. The ULID timestamp doubles as
/// the request's creation time.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// When the request was built (millisecond precision)
    pub fn created_at(&self) -> SystemTime {
        self.0.datetime()
    }

    /// Time since the request was built; zero if the clock went backwards
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.created_at())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
