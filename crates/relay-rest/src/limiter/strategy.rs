//! Per-bucket rate limit strategies
//!
//! A strategy observes each response and returns the minimum time the owning
//! stream must wait before its next dispatch. Two variants exist: one driven
//! by the service's reset headers, one self-limiting via a token bucket for
//! endpoints the service does not cover with headers.

use super::headers;
use crate::http::HttpResponse;
use relay_common::Clock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Remaining-permits value when the service sent no counting headers
pub const REMAINING_UNKNOWN: i64 = -1;

/// A point-in-time view of a bucket's rate limit state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Permits left in the current window; [`REMAINING_UNKNOWN`] if the
    /// service sent none
    pub remaining: i64,
    /// When the window resets, millis since the Unix epoch
    pub reset_at: i64,
    /// The server's clock when this snapshot was observed, millis since the
    /// Unix epoch
    pub date: i64,
}

impl Snapshot {
    /// Skew-safe delay until the window resets
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis((self.reset_at - self.date).max(0) as u64)
    }

    /// True when the window has no permits left
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Lock-free snapshot storage, written by the owning stream's task and read
/// concurrently by `Router::status`.
#[derive(Debug)]
pub(crate) struct SnapshotCell {
    remaining: AtomicI64,
    reset_at: AtomicI64,
    date: AtomicI64,
}

impl SnapshotCell {
    fn new() -> Self {
        Self {
            remaining: AtomicI64::new(REMAINING_UNKNOWN),
            reset_at: AtomicI64::new(0),
            date: AtomicI64::new(0),
        }
    }

    fn store(&self, snapshot: Snapshot) {
        self.remaining.store(snapshot.remaining, Ordering::Release);
        self.reset_at.store(snapshot.reset_at, Ordering::Release);
        self.date.store(snapshot.date, Ordering::Release);
    }

    pub(crate) fn load(&self) -> Snapshot {
        Snapshot {
            remaining: self.remaining.load(Ordering::Acquire),
            reset_at: self.reset_at.load(Ordering::Acquire),
            date: self.date.load(Ordering::Acquire),
        }
    }
}

/// Per-bucket rate limit policy
#[derive(Debug)]
pub enum RateLimitStrategy {
    /// Driven by `X-RateLimit-*` response headers
    Header(HeaderState),
    /// Client-side token bucket for endpoints without headers
    TokenBucket(TokenBucketState),
}

#[derive(Debug)]
pub struct HeaderState {
    cell: Arc<SnapshotCell>,
}

#[derive(Debug)]
pub struct TokenBucketState {
    capacity: u32,
    refill_interval: Duration,
    used: u32,
    window_start: Option<Instant>,
    cell: Arc<SnapshotCell>,
}

impl RateLimitStrategy {
    /// Header-driven strategy (the default for almost every route)
    #[must_use]
    pub fn header() -> Self {
        Self::Header(HeaderState {
            cell: Arc::new(SnapshotCell::new()),
        })
    }

    /// Token bucket allowing `capacity` dispatches per `refill_interval`
    #[must_use]
    pub fn token_bucket(capacity: u32, refill_interval: Duration) -> Self {
        Self::TokenBucket(TokenBucketState {
            capacity: capacity.max(1),
            refill_interval,
            used: 0,
            window_start: None,
            cell: Arc::new(SnapshotCell::new()),
        })
    }

    pub(crate) fn snapshot_cell(&self) -> Arc<SnapshotCell> {
        match self {
            Self::Header(s) => s.cell.clone(),
            Self::TokenBucket(s) => s.cell.clone(),
        }
    }

    /// Current rate limit view
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_cell().load()
    }

    /// Observe a response and return the minimum wait before the next
    /// dispatch from this bucket.
    pub fn apply(&mut self, response: &HttpResponse, clock: &dyn Clock) -> Duration {
        match self {
            Self::Header(state) => state.apply(response, clock),
            Self::TokenBucket(state) => state.apply(clock),
        }
    }
}

impl HeaderState {
    fn apply(&mut self, response: &HttpResponse, clock: &dyn Clock) -> Duration {
        let remaining = response
            .header_i64(headers::HEADER_REMAINING)
            .unwrap_or(REMAINING_UNKNOWN);

        let mut snapshot = self.cell.load();
        snapshot.remaining = remaining;

        let delay = if remaining == 0 {
            match response.header_i64(headers::HEADER_RESET) {
                Some(reset_secs) => {
                    let date = headers::server_date_millis(response)
                        .unwrap_or_else(|| clock.wall_millis());
                    snapshot.reset_at = reset_secs * 1000;
                    snapshot.date = date;
                    snapshot.delay()
                }
                None => Duration::ZERO,
            }
        } else {
            Duration::ZERO
        };

        self.cell.store(snapshot);
        delay
    }
}

impl TokenBucketState {
    /// Consume one permit and report how long until the next one frees up.
    /// Reset time is derived from the bucket's own window, not headers.
    fn apply(&mut self, clock: &dyn Clock) -> Duration {
        let now = clock.monotonic();

        let window_start = match self.window_start {
            Some(start) if now.duration_since(start) < self.refill_interval => start,
            _ => {
                self.used = 0;
                self.window_start = Some(now);
                now
            }
        };

        self.used += 1;

        let delay = if self.used < self.capacity {
            Duration::ZERO
        } else {
            (window_start + self.refill_interval).saturating_duration_since(now)
        };

        let wall = clock.wall_millis();
        self.cell.store(Snapshot {
            remaining: i64::from(self.capacity.saturating_sub(self.used)),
            reset_at: wall + delay.as_millis() as i64,
            date: wall,
        });

        delay
    }
}
