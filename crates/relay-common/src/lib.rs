//! # relay-common
//!
//! Shared utilities for the chat-relay client: clock abstraction,
//! configuration loading, and telemetry setup.

pub mod clock;
pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ApiConfig, BrokerConfig, ClientConfig, ConfigError, GatewayConfig};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig, TracingError};
