//! Rate-limit protocol header parsing

use crate::http::HttpResponse;
use serde::Deserialize;
use std::time::Duration;

pub(crate) const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub(crate) const HEADER_RESET: &str = "x-ratelimit-reset";
pub(crate) const HEADER_GLOBAL: &str = "x-ratelimit-global";
pub(crate) const HEADER_RETRY_AFTER: &str = "retry-after";
pub(crate) const HEADER_DATE: &str = "date";

/// Body shape of a 429 response
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RateLimitBody {
    #[serde(default)]
    pub global: bool,
    /// Milliseconds
    pub retry_after: Option<f64>,
}

pub(crate) fn parse_rate_limit_body(response: &HttpResponse) -> RateLimitBody {
    serde_json::from_slice(response.body()).unwrap_or_default()
}

/// Whether a 429 carries the service-wide flag, in either header or body form
pub(crate) fn is_global(response: &HttpResponse) -> bool {
    if response
        .header(HEADER_GLOBAL)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return true;
    }
    parse_rate_limit_body(response).global
}

/// Resolve the retry delay of a 429.
///
/// The body's `retry_after` is always milliseconds. The `Retry-After` header
/// exists in both a seconds and a milliseconds variant: fractional values
/// are seconds, and integral values are disambiguated by magnitude (no
/// endpoint asks for a wait measured in thousands of seconds).
pub(crate) fn retry_after(response: &HttpResponse) -> Option<Duration> {
    if let Some(millis) = parse_rate_limit_body(response).retry_after {
        return Some(Duration::from_millis(millis.max(0.0) as u64));
    }

    let value = response.header(HEADER_RETRY_AFTER)?.trim();
    if value.contains('.') {
        let seconds: f64 = value.parse().ok()?;
        return Some(Duration::from_millis((seconds.max(0.0) * 1000.0) as u64));
    }

    let number: u64 = value.parse().ok()?;
    if number >= 1_000 {
        Some(Duration::from_millis(number))
    } else {
        Some(Duration::from_secs(number))
    }
}

/// The server's `Date` header as millis since the Unix epoch
pub(crate) fn server_date_millis(response: &HttpResponse) -> Option<i64> {
    let value = response.header(HEADER_DATE)?;
    chrono::DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|d| d.timestamp_millis())
}
