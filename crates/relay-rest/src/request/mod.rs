//! Request descriptions
//!
//! A [`ClientRequest`] is an immutable description of one REST call: a route
//! plus the values substituted into its placeholders and an optional JSON
//! body. It is created by the caller and consumed once by the router.

pub(crate) mod correlation;

use crate::route::Route;
use serde_json::Value;

/// An immutable description of one REST call
#[derive(Debug, Clone)]
pub struct ClientRequest {
    route: Route,
    params: Vec<(&'static str, String)>,
    body: Option<Value>,
    shard: Option<u32>,
}

impl ClientRequest {
    /// Start a request for the given route
    #[must_use]
    pub fn new(route: Route) -> Self {
        Self {
            route,
            params: Vec::new(),
            body: None,
            shard: None,
        }
    }

    /// Substitute a value for the named placeholder
    #[must_use]
    pub fn with_param(mut self, name: &'static str, value: impl ToString) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Tag the request with the shard it originated from (observability only)
    #[must_use]
    pub fn with_shard(mut self, shard: u32) -> Self {
        self.shard = Some(shard);
        self
    }

    /// The route definition
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// The JSON body, if any
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// The shard tag, if any
    #[must_use]
    pub fn shard(&self) -> Option<u32> {
        self.shard
    }

    /// The resolved URI with placeholders substituted
    #[must_use]
    pub fn uri(&self) -> String {
        let mut uri = self.route.template().to_string();
        for (name, value) in &self.params {
            uri = uri.replace(&format!("{{{name}}}"), value);
        }
        uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::routes;

    #[test]
    fn test_uri_substitution() {
        let request = ClientRequest::new(routes::MESSAGE_GET)
            .with_param("channel.id", 123)
            .with_param("message.id", 456);

        assert_eq!(request.uri(), "/channels/123/messages/456");
    }

    #[test]
    fn test_uri_without_params() {
        let request = ClientRequest::new(routes::GATEWAY_GET);
        assert_eq!(request.uri(), "/gateway");
    }

    #[test]
    fn test_body_and_shard() {
        let request = ClientRequest::new(routes::MESSAGE_CREATE)
            .with_param("channel.id", 1)
            .with_body(serde_json::json!({"content": "hi"}))
            .with_shard(3);

        assert_eq!(request.body().unwrap()["content"], "hi");
        assert_eq!(request.shard(), Some(3));
    }
}
