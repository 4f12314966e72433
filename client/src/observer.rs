use serde_json::Value;
use std::time::Duration;

/// One performed request, successful or not.
#[derive(Debug, Clone, Copy)]
pub struct RequestEvent<'a> {
    /// Endpoint path without the query, e.g. `/users/jane/statistics`.
    pub path: &'a str,
    /// `0` when no response was obtained.
    pub status_code: u16,
    /// Requests performed by the client so far, this one included.
    pub request_count: u64,
    /// Decoded body of a successful response.
    pub response: Option<&'a Value>,
    pub rate_limited: bool,
    /// Backoff the client is about to sleep before retrying.
    pub rate_limit_wait: Option<Duration>,
}

/// Gets told about every request the client performs.
pub trait RequestObserver: Send + Sync {
    fn on_request_completed(&self, event: &RequestEvent<'_>);
}
