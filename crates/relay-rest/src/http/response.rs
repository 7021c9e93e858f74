//! Raw HTTP responses
//!
//! A transport-agnostic response: status, headers (case-insensitive), body
//! bytes. Built by [`crate::http::HttpClient`] implementations.

use serde::de::DeserializeOwned;

/// A raw HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response with the given status and no headers or body
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header (names are matched case-insensitively)
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
        self
    }

    /// Set the body bytes
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// The HTTP status code
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// True for 2xx statuses
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header value, case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a header and parse it as an integer
    #[must_use]
    pub fn header_i64(&self, name: &str) -> Option<i64> {
        self.header(name).and_then(|v| v.trim().parse().ok())
    }

    /// The body bytes
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = HttpResponse::new(200).with_header("X-RateLimit-Remaining", "4");

        assert_eq!(response.header("x-ratelimit-remaining"), Some("4"));
        assert_eq!(response.header("X-RATELIMIT-REMAINING"), Some("4"));
        assert_eq!(response.header_i64("X-RateLimit-Remaining"), Some(4));
    }

    #[test]
    fn test_is_success() {
        assert!(HttpResponse::new(200).is_success());
        assert!(HttpResponse::new(204).is_success());
        assert!(!HttpResponse::new(404).is_success());
        assert!(!HttpResponse::new(429).is_success());
    }

    #[test]
    fn test_json_decoding() {
        #[derive(serde::Deserialize)]
        struct Body {
            id: u64,
        }

        let response = HttpResponse::new(200).with_body(r#"{"id": 7}"#);
        let body: Body = response.json().unwrap();
        assert_eq!(body.id, 7);
    }
}
