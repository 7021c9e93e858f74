//! Gateway client interface
//!
//! Implemented by the locally-connected client and by the distributed
//! worker variant, so application code cannot tell them apart.

use crate::error::GatewayResult;
use crate::protocol::GatewayPayload;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast;

/// A dispatched gateway event, ready for domain mapping
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    pub event_type: String,
    pub sequence: Option<u64>,
    pub data: Value,
}

impl DispatchEvent {
    /// Extract the event from a dispatch payload. Returns `None` for
    /// non-dispatch payloads and dispatches without data.
    #[must_use]
    pub fn from_payload(payload: &GatewayPayload) -> Option<Self> {
        if !payload.is_dispatch() {
            return None;
        }
        Some(Self {
            event_type: payload.t.clone().unwrap_or_default(),
            sequence: payload.s,
            data: payload.d.clone()?,
        })
    }
}

/// A client of the platform's gateway
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Run the client until the connection (or relay pipeline) terminates.
    async fn execute(&self, gateway_url: &str) -> GatewayResult<()>;

    /// Close the session. With `reconnect`, session state is kept so the
    /// next `execute` resumes instead of identifying.
    async fn close(&self, reconnect: bool) -> GatewayResult<()>;

    /// Subscribe to dispatched events
    fn dispatch(&self) -> broadcast::Receiver<DispatchEvent>;

    /// Subscribe to every inbound payload
    fn receiver(&self) -> broadcast::Receiver<GatewayPayload>;

    /// Handle for sending payloads out through the gateway
    fn sender(&self) -> broadcast::Sender<GatewayPayload>;

    /// The current session id; empty before Ready
    fn session_id(&self) -> String;

    /// The last observed sequence number
    fn sequence(&self) -> u64;

    /// Whether the client currently considers itself connected
    fn is_connected(&self) -> bool;

    /// Last measured heartbeat round-trip
    fn response_time(&self) -> Duration;
}
