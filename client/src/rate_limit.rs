//! Interpretation of the rate limit signals the API sends back.
//!
//! The API reports its hourly quota through `X-Ratelimit-Limit` and
//! `X-Ratelimit-Remaining` on every response. Exhausted quotas come back as
//! `403` or `429`, optionally with `Retry-After` or `X-Ratelimit-Reset`
//! telling us how long to stay away.

use crate::error::value_text;
use chrono::{
    DateTime,
    Utc,
};
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub const LIMIT_HEADER: &str = "X-Ratelimit-Limit";
pub const REMAINING_HEADER: &str = "X-Ratelimit-Remaining";
pub const RESET_HEADER: &str = "X-Ratelimit-Reset";
pub const RETRY_AFTER_HEADER: &str = "Retry-After";

/// Lower bound for the retry ceiling, whatever the caller configures.
pub const MIN_RETRY_CEILING: Duration = Duration::from_secs(5);
const BACKOFF_BASE: Duration = Duration::from_secs(5);
const MAX_BACKOFF_EXPONENT: u32 = 8;

/// Last quota values observed on a response.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimit {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
}

impl RateLimit {
    /// Absent headers keep the previous value, unparsable ones clear it.
    pub fn update(&mut self, headers: &HeaderMap) {
        if let Some(limit) = header_str(headers, LIMIT_HEADER) {
            self.limit = limit.trim().parse().ok();
        }
        if let Some(remaining) = header_str(headers, REMAINING_HEADER) {
            self.remaining = remaining.trim().parse().ok();
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn mentions_rate_limit(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("rate limit") || text.contains("too many requests")
}

/// Whether a failed response should be waited out and retried instead of
/// being surfaced as an error.
pub fn is_rate_limited(status: u16, remaining: Option<u32>, message: &str, payload: Option<&Value>) -> bool {
    if status != 403 && status != 429 {
        return false;
    }
    if remaining == Some(0) {
        return true;
    }
    if mentions_rate_limit(message) {
        return true;
    }
    payload
        .and_then(|payload| payload.get("errors"))
        .and_then(Value::as_array)
        .is_some_and(|errors| errors.iter().any(|entry| mentions_rate_limit(&value_text(entry))))
}

/// Parses `Retry-After` as either delta seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if seconds.is_finite() && seconds > 0.0 {
            return Duration::try_from_secs_f64(seconds).ok();
        }
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let millis = (date - now).num_milliseconds();
    if millis <= 0 {
        return None;
    }
    // HTTP dates only have second precision, round up so we never wake early.
    let seconds = (millis as u64).div_ceil(1000).max(1);
    Some(Duration::from_secs(seconds))
}

fn parse_reset(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let reset_epoch = value.trim().parse::<f64>().ok()?;
    let now_epoch = now.timestamp_millis() as f64 / 1000.0;
    if !reset_epoch.is_finite() || reset_epoch <= now_epoch {
        return None;
    }
    Duration::try_from_secs_f64(reset_epoch - now_epoch + 1.0).ok()
}

/// How long to sleep before retrying a rate limited request.
///
/// `Retry-After` wins over `X-Ratelimit-Reset`, which wins over exponential
/// backoff. Every branch is capped at `ceiling`.
pub fn retry_wait(
    headers: &HeaderMap,
    rate_limit_hits: u32,
    min_request_interval: Duration,
    ceiling: Duration,
    now: DateTime<Utc>,
) -> Duration {
    if let Some(wait) = header_str(headers, RETRY_AFTER_HEADER).and_then(|value| parse_retry_after(value, now)) {
        return wait.min(ceiling);
    }

    if let Some(wait) = header_str(headers, RESET_HEADER).and_then(|value| parse_reset(value, now)) {
        return wait.min(ceiling);
    }

    let base = min_request_interval.max(BACKOFF_BASE);
    let multiplier = 2u32.pow(rate_limit_hits.min(MAX_BACKOFF_EXPONENT));
    base.saturating_mul(multiplier).min(ceiling)
}
