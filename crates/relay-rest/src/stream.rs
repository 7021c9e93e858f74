//! Per-bucket request streams
//!
//! Each rate-limit bucket gets one stream: a FIFO of pending correlations
//! drained by a dedicated task, one HTTP call in flight at a time. The task
//! waits on the global gate, then on its own bucket delay, dispatches,
//! pushes the response through the transformer pipeline, and completes the
//! caller's handle.

use crate::bucket::BucketKey;
use crate::error::RouterError;
use crate::http::{HttpClient, HttpResponse};
use crate::limiter::{headers, GlobalRateLimiter, RateLimitStrategy, SnapshotCell};
use crate::request::correlation::RequestCorrelation;
use crate::response::{apply_pipeline, PipelineVerdict, ResponseFunction, ResponseOutcome};
use relay_common::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Handle held by the router: the queue's send side plus the shared
/// snapshot cell for status reads.
#[derive(Clone)]
pub(crate) struct StreamHandle {
    pub(crate) queue: mpsc::UnboundedSender<RequestCorrelation>,
    pub(crate) snapshot: Arc<SnapshotCell>,
}

pub(crate) struct StreamConfig {
    pub(crate) http: Arc<dyn HttpClient>,
    pub(crate) global: Arc<GlobalRateLimiter>,
    pub(crate) transformers: Arc<Vec<ResponseFunction>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) closed: Arc<AtomicBool>,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Spawn the stream task for a bucket and return its handle.
pub(crate) fn spawn_stream(
    key: BucketKey,
    strategy: RateLimitStrategy,
    config: StreamConfig,
) -> StreamHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let snapshot = strategy.snapshot_cell();

    let worker = StreamWorker {
        key,
        strategy,
        queue: rx,
        retry_slot: None,
        next_delay: Duration::ZERO,
        config,
    };
    tokio::spawn(worker.run());

    StreamHandle {
        queue: tx,
        snapshot,
    }
}

struct StreamWorker {
    key: BucketKey,
    strategy: RateLimitStrategy,
    queue: mpsc::UnboundedReceiver<RequestCorrelation>,
    /// A correlation requeued at the head (429 absorb or retry-once)
    retry_slot: Option<RequestCorrelation>,
    /// Bucket delay owed before the next dispatch
    next_delay: Duration,
    config: StreamConfig,
}

impl StreamWorker {
    async fn run(mut self) {
        tracing::trace!(bucket = %self.key, "request stream started");

        while let Some(correlation) = self.next_correlation().await {
            if self.config.closed.load(Ordering::Acquire) {
                correlation.complete(ResponseOutcome::Failure(RouterError::Cancelled));
                continue;
            }
            if correlation.is_cancelled() {
                tracing::trace!(bucket = %self.key, "dropping cancelled request");
                continue;
            }

            self.config.global.await_ready().await;

            if !self.next_delay.is_zero() {
                tokio::time::sleep(self.next_delay).await;
                self.next_delay = Duration::ZERO;
            }

            self.dispatch(correlation).await;
        }

        tracing::trace!(bucket = %self.key, "request stream stopped");
    }

    /// Head of the queue: a requeued correlation first, then the FIFO. An
    /// idle timeout closes the queue, which drains anything that raced in
    /// and then ends the task.
    async fn next_correlation(&mut self) -> Option<RequestCorrelation> {
        if let Some(correlation) = self.retry_slot.take() {
            return Some(correlation);
        }
        match self.config.idle_timeout {
            None => self.queue.recv().await,
            Some(idle) => match tokio::time::timeout(idle, self.queue.recv()).await {
                Ok(correlation) => correlation,
                Err(_) => {
                    tracing::debug!(bucket = %self.key, "request stream idle, evicting");
                    self.queue.close();
                    self.queue.recv().await
                }
            },
        }
    }

    async fn dispatch(&mut self, mut correlation: RequestCorrelation) {
        let route = *correlation.request.route();
        tracing::trace!(
            bucket = %self.key,
            uri = %correlation.request.uri(),
            shard = ?correlation.request.shard(),
            "dispatching request"
        );

        let outcome = match self.config.http.execute(&correlation.request).await {
            Err(err) => {
                tracing::debug!(bucket = %self.key, error = %err, "transport failure");
                ResponseOutcome::Failure(RouterError::Transport(err))
            }
            Ok(response) if response.status() == 429 => {
                self.absorb_rate_limit(&response);
                if !correlation.rate_limit_requeued {
                    correlation.rate_limit_requeued = true;
                    self.retry_slot = Some(correlation);
                    return;
                }
                // repeated 429 on the same correlation: surface it
                Self::failure(response)
            }
            Ok(response) => {
                self.next_delay = self
                    .strategy
                    .apply(&response, self.config.clock.as_ref());
                if response.is_success() {
                    ResponseOutcome::Success(response)
                } else {
                    Self::failure(response)
                }
            }
        };

        match apply_pipeline(
            &self.config.transformers,
            &route,
            outcome,
            !correlation.user_retried,
        ) {
            PipelineVerdict::Retry => {
                tracing::debug!(bucket = %self.key, "transformer requested retry");
                correlation.user_retried = true;
                self.retry_slot = Some(correlation);
            }
            PipelineVerdict::Deliver(outcome) => correlation.complete(outcome),
        }
    }

    /// Update limiter state from a 429. Bucket-scoped limits extend this
    /// stream's delay; the global flag trips the shared gate instead.
    fn absorb_rate_limit(&mut self, response: &HttpResponse) {
        let retry_after = headers::retry_after(response);
        let strategy_delay = self
            .strategy
            .apply(response, self.config.clock.as_ref());

        if headers::is_global(response) {
            self.config
                .global
                .trip(retry_after.unwrap_or(strategy_delay));
        } else {
            self.next_delay = strategy_delay.max(retry_after.unwrap_or_default());
            tracing::debug!(
                bucket = %self.key,
                delay = ?self.next_delay,
                "bucket rate limited"
            );
        }
    }

    fn failure(response: HttpResponse) -> ResponseOutcome {
        ResponseOutcome::Failure(RouterError::HttpStatus {
            status: response.status(),
            body: String::from_utf8_lossy(response.body()).into_owned(),
        })
    }
}
