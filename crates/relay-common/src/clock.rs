//! Clock abstraction
//!
//! All rate-limit delay computations go through a [`Clock`] so that tests can
//! substitute a controlled time source.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A source of monotonic and wall-clock time.
pub trait Clock: Send + Sync + 'static {
    /// Wall-clock time as milliseconds since the Unix epoch.
    fn wall_millis(&self) -> i64;

    /// A monotonic instant for interval arithmetic.
    fn monotonic(&self) -> Instant;
}

/// The process clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn wall_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// A manually advanced clock for deterministic tests.
///
/// Both wall and monotonic time move only when [`ManualClock::advance`] is
/// called.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset_millis: Arc<AtomicI64>,
    wall_base_millis: i64,
}

impl ManualClock {
    /// Create a clock whose wall time starts at the given epoch millis.
    #[must_use]
    pub fn starting_at(wall_millis: i64) -> Self {
        Self {
            base: Instant::now(),
            offset_millis: Arc::new(AtomicI64::new(0)),
            wall_base_millis: wall_millis,
        }
    }

    /// Advance both wall and monotonic time.
    pub fn advance(&self, by: Duration) {
        self.offset_millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(0)
    }
}

impl Clock for ManualClock {
    fn wall_millis(&self) -> i64 {
        self.wall_base_millis + self.offset_millis.load(Ordering::SeqCst)
    }

    fn monotonic(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst).max(0) as u64)
    }
}
