//! HTTP client seam
//!
//! The router dispatches through the [`HttpClient`] trait so that tests can
//! script responses without a network.

mod response;
mod web_client;

pub use response::HttpResponse;
pub use web_client::WebClient;

use crate::request::ClientRequest;
use async_trait::async_trait;

/// The HTTP client failed before producing a response (connect, TLS, DNS)
#[derive(Debug, thiserror::Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Executes REST calls on behalf of the router
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Issue the request and return the raw response.
    ///
    /// Non-2xx statuses are *not* errors at this layer; the router
    /// interprets them.
    async fn execute(&self, request: &ClientRequest) -> Result<HttpResponse, TransportError>;
}
