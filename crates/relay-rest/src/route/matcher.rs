//! Route matching
//!
//! Predicates over routes, used by the response transformer pipeline to
//! scope cross-cutting behavior.

use super::Route;

/// A predicate over [`Route`]s
#[derive(Debug, Clone)]
pub enum RouteMatcher {
    /// Matches every route
    Any,
    /// Matches one route definition
    Only(Route),
    /// Matches any route in the set
    AnyOf(Vec<Route>),
}

impl RouteMatcher {
    /// Matcher accepting every route
    #[must_use]
    pub fn any() -> Self {
        Self::Any
    }

    /// Matcher accepting a single route
    #[must_use]
    pub fn route(route: Route) -> Self {
        Self::Only(route)
    }

    /// Matcher accepting any of the given routes
    #[must_use]
    pub fn any_of(routes: impl Into<Vec<Route>>) -> Self {
        Self::AnyOf(routes.into())
    }

    /// Check whether the matcher accepts the given route
    #[must_use]
    pub fn matches(&self, route: &Route) -> bool {
        match self {
            Self::Any => true,
            Self::Only(r) => r.is(route),
            Self::AnyOf(rs) => rs.iter().any(|r| r.is(route)),
        }
    }
}

impl Default for RouteMatcher {
    fn default() -> Self {
        Self::Any
    }
}
