//! Upstream (leader) gateway client
//!
//! Wraps a real gateway client and bridges it to the broker: every inbound
//! payload goes out through the sink, every payload arriving from workers is
//! injected into the real connection's outbound stream, and worker control
//! requests are applied to the connection and echoed back as
//! acknowledgment.

use super::broadcast_stream;
use crate::broker::{PayloadSink, PayloadSource};
use crate::client::{DispatchEvent, GatewayClient};
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{ControlOp, GatewayPayload};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Leader node: owns the real connection, relays through the broker
pub struct UpstreamGatewayClient<C: GatewayClient> {
    delegate: Arc<C>,
    sink: Arc<dyn PayloadSink>,
    source: Arc<dyn PayloadSource>,
}

impl<C: GatewayClient + 'static> UpstreamGatewayClient<C> {
    #[must_use]
    pub fn new(delegate: Arc<C>, sink: Arc<dyn PayloadSink>, source: Arc<dyn PayloadSource>) -> Self {
        Self {
            delegate,
            sink,
            source,
        }
    }
}

#[async_trait]
impl<C: GatewayClient + 'static> GatewayClient for UpstreamGatewayClient<C> {
    async fn execute(&self, gateway_url: &str) -> GatewayResult<()> {
        // inbound payloads out to the broker
        let relay_out = async {
            self.sink
                .send(broadcast_stream(self.delegate.receiver()))
                .await
                .map_err(GatewayError::from)
        };

        // worker commands into the real connection's outbound stream
        let relay_in = async {
            let sender = self.delegate.sender();
            self.source
                .receive(Box::new(move |payload| {
                    // best-effort: a command racing a reconnect is dropped
                    let _ = sender.send(payload);
                    Box::pin(futures_util::future::ready(Ok(())))
                }))
                .await
                .map_err(GatewayError::from)
        };

        // worker control requests: apply to the connection, echo as ack
        let control = async {
            let delegate = self.delegate.clone();
            let sink = self.sink.clone();
            self.source
                .receive_control(Box::new(move |control| {
                    let delegate = delegate.clone();
                    let sink = sink.clone();
                    Box::pin(async move {
                        tracing::info!(
                            op = ?control.op,
                            shard = control.shard_index,
                            "control request from worker"
                        );
                        let reconnect = control.op == ControlOp::Reconnect;
                        if delegate.close(reconnect).await.is_err() {
                            tracing::debug!("connection already down, acknowledging anyway");
                        }
                        sink.send_control(futures_util::stream::iter([control]).boxed())
                            .await
                    })
                }))
                .await
                .map_err(GatewayError::from)
        };

        // the real connection itself
        let connection = self.delegate.execute(gateway_url);

        tokio::try_join!(relay_out, relay_in, control, connection).map(|_| ())
    }

    async fn close(&self, reconnect: bool) -> GatewayResult<()> {
        self.delegate.close(reconnect).await
    }

    fn dispatch(&self) -> broadcast::Receiver<DispatchEvent> {
        self.delegate.dispatch()
    }

    fn receiver(&self) -> broadcast::Receiver<GatewayPayload> {
        self.delegate.receiver()
    }

    fn sender(&self) -> broadcast::Sender<GatewayPayload> {
        self.delegate.sender()
    }

    fn session_id(&self) -> String {
        self.delegate.session_id()
    }

    fn sequence(&self) -> u64 {
        self.delegate.sequence()
    }

    fn is_connected(&self) -> bool {
        self.delegate.is_connected()
    }

    fn response_time(&self) -> Duration {
        self.delegate.response_time()
    }
}
