//! Router error types

use crate::http::TransportError;

/// Errors surfaced by the request router
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The HTTP client failed before a response arrived
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response arrived with a non-2xx status and no transformer
    /// converted it
    #[error("HTTP status {status}")]
    HttpStatus { status: u16, body: String },

    /// The caller dropped its future, or the router was closed with the
    /// request still queued
    #[error("request was cancelled")]
    Cancelled,

    /// `status` was asked for a bucket that has no stream yet
    #[error("no request stream exists for this bucket")]
    UnknownBucket,

    /// The router has been closed
    #[error("router is closed")]
    Closed,

    /// The response body could not be decoded into the requested type
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RouterError {
    /// The HTTP status carried by this error, if any
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for router operations
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        let err = RouterError::HttpStatus {
            status: 404,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(RouterError::Cancelled.status(), None);
    }
}
