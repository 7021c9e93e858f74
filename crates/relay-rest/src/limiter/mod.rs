//! Rate limiting
//!
//! The global limiter gates every stream at once; per-bucket strategies
//! decide how long a single stream waits between dispatches.

pub(crate) mod headers;

mod global;
mod strategy;

pub use global::GlobalRateLimiter;
pub use strategy::{RateLimitStrategy, Snapshot, REMAINING_UNKNOWN};

pub(crate) use strategy::SnapshotCell;
