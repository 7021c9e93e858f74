//! Rate-limit bucket identification
//!
//! The service rate-limits per (route template, major parameter) pair. The
//! major parameter is the id of the top-level resource (guild, channel)
//! named by the route's template; routes without one share a sentinel.

use crate::request::ClientRequest;
use crate::route::routes;

/// Sentinel major parameter for routes without a top-level resource
pub const NO_MAJOR_PARAMETER: &str = "-";

/// Identity of a rate-limit bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    template: String,
    major: String,
}

impl BucketKey {
    /// Compute the bucket a request falls into.
    ///
    /// Message deletion gets a method-qualified template: the service
    /// assigns it a dedicated bucket separate from the other message
    /// routes on the same URI.
    #[must_use]
    pub fn compute(request: &ClientRequest) -> Self {
        let route = request.route();
        let template = if route.is(&routes::MESSAGE_DELETE) {
            format!("{} {}", route.method(), route.template())
        } else {
            route.template().to_string()
        };

        let major = route
            .major_param()
            .and_then(|param| extract_major(route.template(), &request.uri(), param))
            .unwrap_or_else(|| NO_MAJOR_PARAMETER.to_string());

        Self { template, major }
    }

    /// The (possibly method-qualified) route template
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The major parameter value, or the sentinel
    #[must_use]
    pub fn major(&self) -> &str {
        &self.major
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.major, self.template)
    }
}

/// Walk the template and resolved URI in lockstep and capture the segment
/// where the template holds the named placeholder.
fn extract_major(template: &str, uri: &str, param: &str) -> Option<String> {
    let placeholder = format!("{{{param}}}");
    template
        .split('/')
        .zip(uri.split('/'))
        .find(|(t, _)| *t == placeholder)
        .map(|(_, u)| u.to_string())
}
