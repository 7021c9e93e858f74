//! # relay-rest
//!
//! Bucket-aware REST request router. Requests are queued per rate-limit
//! bucket and dispatched serially by a dedicated stream, honoring both
//! per-bucket reset headers and the service-wide global rate limit.

pub mod bucket;
pub mod error;
pub mod http;
pub mod limiter;
pub mod request;
pub mod response;
pub mod route;
pub mod router;

mod stream;

// Re-export commonly used types at crate root
pub use bucket::BucketKey;
pub use error::{RouterError, RouterResult};
pub use http::{HttpClient, HttpResponse, TransportError, WebClient};
pub use limiter::{GlobalRateLimiter, RateLimitStrategy, Snapshot};
pub use request::ClientRequest;
pub use response::{ResponseFunction, ResponseOutcome};
pub use route::{routes, Method, Route, RouteMatcher};
pub use router::{RequestStreamStatus, Router, RouterOptions};
