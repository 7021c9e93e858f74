//! Response transformer pipeline
//!
//! An ordered list of cross-cutting transformers applied to every response a
//! stream produces, before the caller's future is completed. Order matters:
//! a transformer that converts a 404 into an empty success shadows a later
//! retry on the same status.

use crate::error::RouterError;
use crate::http::HttpResponse;
use crate::route::{Route, RouteMatcher};

/// The final result delivered to a caller
#[derive(Debug)]
pub enum ResponseOutcome {
    /// A successful response with its raw payload
    Success(HttpResponse),
    /// Deliberate empty success (e.g. a swallowed 404)
    Empty,
    /// A typed error
    Failure(RouterError),
}

/// Verdict of running the pipeline over one response
pub(crate) enum PipelineVerdict {
    /// Complete the caller's future with this outcome
    Deliver(ResponseOutcome),
    /// Re-enqueue the correlation at the head of its stream
    Retry,
}

#[derive(Debug, Clone)]
enum Behavior {
    EmptyOnStatus(Vec<u16>),
    RetryOnceOnStatus(Vec<u16>),
}

/// A cross-cutting response transformer
#[derive(Debug, Clone)]
pub struct ResponseFunction {
    matcher: RouteMatcher,
    behavior: Behavior,
}

impl ResponseFunction {
    /// Convert any 404 into an empty success
    #[must_use]
    pub fn empty_if_not_found() -> Self {
        Self::empty_on_error_status(RouteMatcher::any(), [404])
    }

    /// Convert 404s from matching routes into an empty success
    #[must_use]
    pub fn empty_if_not_found_for(matcher: RouteMatcher) -> Self {
        Self::empty_on_error_status(matcher, [404])
    }

    /// Convert the listed error statuses from matching routes into an empty
    /// success
    #[must_use]
    pub fn empty_on_error_status(
        matcher: RouteMatcher,
        statuses: impl Into<Vec<u16>>,
    ) -> Self {
        Self {
            matcher,
            behavior: Behavior::EmptyOnStatus(statuses.into()),
        }
    }

    /// Retry once on the listed error statuses, for every route
    #[must_use]
    pub fn retry_once_on_error_status(statuses: impl Into<Vec<u16>>) -> Self {
        Self::retry_once_on_error_status_for(RouteMatcher::any(), statuses)
    }

    /// Retry once on the listed error statuses from matching routes
    #[must_use]
    pub fn retry_once_on_error_status_for(
        matcher: RouteMatcher,
        statuses: impl Into<Vec<u16>>,
    ) -> Self {
        Self {
            matcher,
            behavior: Behavior::RetryOnceOnStatus(statuses.into()),
        }
    }
}

/// Run the transformer list, in order, over one outcome.
///
/// `retry_available` is false once the correlation has spent its retry-once
/// budget; retry transformers then pass the failure through unchanged.
pub(crate) fn apply_pipeline(
    transformers: &[ResponseFunction],
    route: &Route,
    mut outcome: ResponseOutcome,
    retry_available: bool,
) -> PipelineVerdict {
    for transformer in transformers {
        if !transformer.matcher.matches(route) {
            continue;
        }

        let status = match &outcome {
            ResponseOutcome::Failure(err) => match err.status() {
                Some(status) => status,
                None => continue,
            },
            _ => continue,
        };

        match &transformer.behavior {
            Behavior::EmptyOnStatus(statuses) => {
                if statuses.contains(&status) {
                    outcome = ResponseOutcome::Empty;
                }
            }
            Behavior::RetryOnceOnStatus(statuses) => {
                if statuses.contains(&status) && retry_available {
                    return PipelineVerdict::Retry;
                }
            }
        }
    }
    PipelineVerdict::Deliver(outcome)
}
