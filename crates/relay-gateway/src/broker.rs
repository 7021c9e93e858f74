//! Broker bridge interfaces
//!
//! Transport-agnostic contract between relay nodes and the pub/sub broker
//! carrying payloads and control messages. Implementations choose their own
//! encoding; delivery is best-effort, so consumers tolerate duplicates and
//! sequence gaps.

use crate::error::BrokerError;
use crate::protocol::{GatewayPayload, NodeControl};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

/// A lazy, possibly infinite sequence of payloads to publish
pub type PayloadStream = BoxStream<'static, GatewayPayload>;

/// A lazy, possibly infinite sequence of control messages to publish
pub type ControlStream = BoxStream<'static, NodeControl>;

/// Callback invoked for each payload received from the broker
pub type PayloadHandler =
    Box<dyn FnMut(GatewayPayload) -> BoxFuture<'static, Result<(), BrokerError>> + Send>;

/// Callback invoked for each control message received from the broker
pub type ControlHandler =
    Box<dyn FnMut(NodeControl) -> BoxFuture<'static, Result<(), BrokerError>> + Send>;

/// Publishes payloads and control messages to the broker.
///
/// Each operation completes when its source stream completes; a transport
/// error terminates it with that error. Ordering is preserved within one
/// call but not across calls.
#[async_trait]
pub trait PayloadSink: Send + Sync + 'static {
    async fn send(&self, payloads: PayloadStream) -> Result<(), BrokerError>;

    async fn send_control(&self, controls: ControlStream) -> Result<(), BrokerError>;
}

/// Consumes payloads and control messages from the broker.
///
/// The outer future completes when the underlying subscription ends; a
/// handler error terminates the subscription with that error.
#[async_trait]
pub trait PayloadSource: Send + Sync + 'static {
    async fn receive(&self, handler: PayloadHandler) -> Result<(), BrokerError>;

    async fn receive_control(&self, handler: ControlHandler) -> Result<(), BrokerError>;
}
