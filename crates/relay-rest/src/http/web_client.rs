//! reqwest-backed HTTP client

use super::{HttpClient, HttpResponse, TransportError};
use crate::request::ClientRequest;
use crate::route::Method;
use async_trait::async_trait;
use relay_common::ApiConfig;
use std::time::Duration;

/// HTTP client executing requests against the platform's REST API
#[derive(Clone)]
pub struct WebClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl WebClient {
    /// Create a client for the given API base URL and token
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, token, Duration::from_secs(30))
    }

    /// Create a client with an explicit per-request timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    /// Create a client from configuration
    pub fn from_config(config: &ApiConfig, token: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(
            &config.base_url,
            token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn method_of(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl HttpClient for WebClient {
    async fn execute(&self, request: &ClientRequest) -> Result<HttpResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.uri());

        let mut builder = self
            .client
            .request(Self::method_of(request.route().method()), &url)
            .header("Authorization", &self.token);

        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let mut out = HttpResponse::new(status);
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                out = out.with_header(name.as_str(), value);
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(out.with_body(body.to_vec()))
    }
}
