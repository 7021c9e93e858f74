//! Service-wide rate limit gate
//!
//! A single deadline cell shared by every request stream. When tripped,
//! every stream's next dispatch waits for the deadline; when clear, awaiting
//! it is a no-op.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Process-wide rate limit gate
#[derive(Debug, Default)]
pub struct GlobalRateLimiter {
    deadline: Mutex<Option<Instant>>,
}

impl GlobalRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the deadline to `now + duration` if that is later than the
    /// current one.
    pub fn trip(&self, duration: Duration) {
        let target = Instant::now() + duration;
        let mut deadline = self.deadline.lock().expect("global limiter poisoned");
        match *deadline {
            Some(current) if current >= target => {}
            _ => {
                tracing::warn!(delay = ?duration, "global rate limit tripped");
                *deadline = Some(target);
            }
        }
    }

    /// True while a deadline is pending
    #[must_use]
    pub fn is_limited(&self) -> bool {
        let deadline = self.deadline.lock().expect("global limiter poisoned");
        matches!(*deadline, Some(d) if d > Instant::now())
    }

    /// Complete immediately if no deadline is active, otherwise wait for it.
    ///
    /// A `trip` arriving while waiting extends the wait; the loop re-reads
    /// the cell after every sleep.
    pub async fn await_ready(&self) {
        loop {
            let pending = {
                let mut deadline = self.deadline.lock().expect("global limiter poisoned");
                match *deadline {
                    None => return,
                    Some(d) if d <= Instant::now() => {
                        *deadline = None;
                        return;
                    }
                    Some(d) => d,
                }
            };
            tokio::time::sleep_until(pending).await;
        }
    }
}
