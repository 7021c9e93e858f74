//! Request router façade
//!
//! Routes each request to the stream owning its rate-limit bucket, creating
//! streams lazily. Two concurrent submissions to a new bucket still produce
//! exactly one stream; losers of the race reuse the winner's.

use crate::bucket::BucketKey;
use crate::error::{RouterError, RouterResult};
use crate::http::HttpClient;
use crate::limiter::{GlobalRateLimiter, RateLimitStrategy, Snapshot};
use crate::request::correlation::RequestCorrelation;
use crate::request::ClientRequest;
use crate::response::{ResponseFunction, ResponseOutcome};
use crate::route::routes;
use crate::stream::{spawn_stream, StreamConfig, StreamHandle};
use dashmap::DashMap;
use relay_common::{Clock, SystemClock};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Options controlling a [`Router`]
pub struct RouterOptions {
    response_transformers: Vec<ResponseFunction>,
    idle_timeout: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl RouterOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            response_transformers: Vec::new(),
            idle_timeout: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Append a response transformer. Transformers run in the order they
    /// were added, on every response the router produces.
    #[must_use]
    pub fn on_client_response(mut self, transformer: ResponseFunction) -> Self {
        self.response_transformers.push(transformer);
        self
    }

    /// Let idle streams evict themselves after this long without traffic.
    /// Re-creation on the next request is transparent. Default: never.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    /// Substitute the time source (tests)
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of one bucket's rate limit situation
#[derive(Debug, Clone, Copy)]
pub struct RequestStreamStatus {
    global_rate_limited: bool,
    snapshot: Snapshot,
}

impl RequestStreamStatus {
    /// True while the service-wide limit is tripped
    #[must_use]
    pub fn is_global_rate_limited(&self) -> bool {
        self.global_rate_limited
    }

    /// True if either the global limit is tripped or the bucket is out of
    /// permits
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.global_rate_limited || self.snapshot.is_exhausted()
    }

    /// The bucket's last observed rate limit snapshot
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
    }
}

/// Bucket-aware request router
pub struct Router {
    http: Arc<dyn HttpClient>,
    global: Arc<GlobalRateLimiter>,
    streams: DashMap<BucketKey, StreamHandle>,
    transformers: Arc<Vec<ResponseFunction>>,
    clock: Arc<dyn Clock>,
    idle_timeout: Option<Duration>,
    closed: Arc<AtomicBool>,
}

impl Router {
    /// Create a router with default options
    #[must_use]
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self::with_options(http, RouterOptions::default())
    }

    /// Create a router with the given options
    #[must_use]
    pub fn with_options(http: Arc<dyn HttpClient>, options: RouterOptions) -> Self {
        Self {
            http,
            global: Arc::new(GlobalRateLimiter::new()),
            streams: DashMap::new(),
            transformers: Arc::new(options.response_transformers),
            clock: options.clock,
            idle_timeout: options.idle_timeout,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Submit a request and decode its response.
    ///
    /// Returns `Ok(None)` for deliberate empty successes: bodyless 2xx
    /// responses and statuses a transformer converted to empty.
    pub async fn exchange<T: DeserializeOwned>(
        &self,
        request: ClientRequest,
    ) -> RouterResult<Option<T>> {
        match self.enqueue(request)?.await {
            Err(_) => Err(RouterError::Closed),
            Ok(ResponseOutcome::Empty) => Ok(None),
            Ok(ResponseOutcome::Failure(err)) => Err(err),
            Ok(ResponseOutcome::Success(response)) => {
                if response.body().is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(response.json()?))
                }
            }
        }
    }

    /// Submit a request and return the raw completion handle.
    ///
    /// Dropping the receiver cancels the correlation: a queued request is
    /// discarded at dequeue, an in-flight one drains with its result thrown
    /// away.
    pub fn enqueue(
        &self,
        request: ClientRequest,
    ) -> RouterResult<oneshot::Receiver<ResponseOutcome>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RouterError::Closed);
        }

        let key = BucketKey::compute(&request);
        let (tx, rx) = oneshot::channel();
        let mut correlation = RequestCorrelation::new(request, tx);

        loop {
            let handle = self.stream_for(&key, &correlation.request);
            match handle.queue.send(correlation) {
                Ok(()) => return Ok(rx),
                Err(tokio::sync::mpsc::error::SendError(rejected)) => {
                    // the stream idled out between lookup and push; drop the
                    // stale entry and recreate
                    self.streams.remove_if(&key, |_, h| h.queue.is_closed());
                    correlation = rejected;
                }
            }
        }
    }

    /// Rate limit status of the bucket this request falls into.
    ///
    /// Errors until at least one request has been routed to that bucket.
    pub fn status(&self, request: &ClientRequest) -> RouterResult<RequestStreamStatus> {
        let key = BucketKey::compute(request);
        let handle = self
            .streams
            .get(&key)
            .ok_or(RouterError::UnknownBucket)?;

        Ok(RequestStreamStatus {
            global_rate_limited: self.global.is_limited(),
            snapshot: handle.snapshot.load(),
        })
    }

    /// Close the router: queued requests are cancelled, in-flight requests
    /// drain, new submissions fail with [`RouterError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.streams.clear();
        tracing::debug!("router closed");
    }

    fn stream_for(&self, key: &BucketKey, request: &ClientRequest) -> StreamHandle {
        self.streams
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::trace!(bucket = %key, route = %request.route(), "creating request stream");
                spawn_stream(
                    key.clone(),
                    Self::strategy_for(request),
                    StreamConfig {
                        http: self.http.clone(),
                        global: self.global.clone(),
                        transformers: self.transformers.clone(),
                        clock: self.clock.clone(),
                        closed: self.closed.clone(),
                        idle_timeout: self.idle_timeout,
                    },
                )
            })
            .clone()
    }

    /// Reactions carry no rate limit headers; the client self-limits them.
    /// Everything else follows the service's reset headers.
    fn strategy_for(request: &ClientRequest) -> RateLimitStrategy {
        if request.route().is(&routes::REACTION_CREATE) {
            RateLimitStrategy::token_bucket(1, Duration::from_millis(250))
        } else {
            RateLimitStrategy::header()
        }
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}
