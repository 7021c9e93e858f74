//! Request correlations
//!
//! A correlation pairs a pending request with its single-fire completion
//! handle and its retry accounting. The completion handle is fulfilled
//! exactly once: with a response, an error, or by cancellation (the caller
//! dropping its side).

use super::ClientRequest;
use crate::response::ResponseOutcome;
use tokio::sync::oneshot;

pub(crate) struct RequestCorrelation {
    pub(crate) request: ClientRequest,
    callback: oneshot::Sender<ResponseOutcome>,
    /// Whether the user-level retry-once budget has been spent
    pub(crate) user_retried: bool,
    /// Whether the automatic 429 head-requeue has already happened
    pub(crate) rate_limit_requeued: bool,
}

impl RequestCorrelation {
    pub(crate) fn new(request: ClientRequest, callback: oneshot::Sender<ResponseOutcome>) -> Self {
        Self {
            request,
            callback,
            user_retried: false,
            rate_limit_requeued: false,
        }
    }

    /// True if the caller has dropped its future
    pub(crate) fn is_cancelled(&self) -> bool {
        self.callback.is_closed()
    }

    /// Fulfill the completion handle. A send failure means the caller went
    /// away in the meantime; the result is discarded.
    pub(crate) fn complete(self, outcome: ResponseOutcome) {
        let _ = self.callback.send(outcome);
    }
}
