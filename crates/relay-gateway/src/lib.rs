//! # relay-gateway
//!
//! Gateway clients for the chat platform. [`ws::DefaultGatewayClient`] holds
//! a real WebSocket connection; the `distributed` module splits one
//! connection across processes: an upstream leader relays payloads through a
//! pub/sub broker to downstream workers that present the same
//! [`GatewayClient`] interface without holding a connection.

pub mod broker;
pub mod client;
pub mod distributed;
pub mod error;
pub mod protocol;
pub mod ws;

// Re-export commonly used types at crate root
pub use broker::{ControlHandler, ControlStream, PayloadHandler, PayloadSink, PayloadSource, PayloadStream};
pub use client::{DispatchEvent, GatewayClient};
pub use distributed::{DownstreamGatewayClient, UpstreamGatewayClient};
pub use error::{BrokerError, GatewayError, GatewayResult};
pub use protocol::{ControlOp, GatewayPayload, NodeControl, OpCode};
pub use ws::DefaultGatewayClient;
