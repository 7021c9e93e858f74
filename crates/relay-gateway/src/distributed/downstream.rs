//! Downstream (worker) gateway client
//!
//! Holds no real connection. Inbound payloads arrive from the broker and
//! feed the local receiver and dispatch topics; outbound payloads and
//! control requests flow back through the broker. Session id and last
//! sequence are tracked locally from the payloads that pass through.

use super::broadcast_stream;
use crate::broker::{PayloadSink, PayloadSource};
use crate::client::{DispatchEvent, GatewayClient};
use crate::error::{BrokerError, GatewayError, GatewayResult};
use crate::protocol::{GatewayPayload, NodeControl};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

const TOPIC_CAPACITY: usize = 256;

/// Worker node: a gateway client fed entirely through the broker
pub struct DownstreamGatewayClient {
    sink: Arc<dyn PayloadSink>,
    source: Arc<dyn PayloadSource>,
    shard_index: u32,
    dispatch_tx: broadcast::Sender<DispatchEvent>,
    receiver_tx: broadcast::Sender<GatewayPayload>,
    sender_tx: broadcast::Sender<GatewayPayload>,
    control_receiver_tx: broadcast::Sender<NodeControl>,
    control_sender_tx: broadcast::Sender<NodeControl>,
    last_sequence: Arc<AtomicU64>,
    session_id: Arc<RwLock<String>>,
}

impl DownstreamGatewayClient {
    #[must_use]
    pub fn new(
        sink: Arc<dyn PayloadSink>,
        source: Arc<dyn PayloadSource>,
        shard_index: u32,
    ) -> Self {
        Self {
            sink,
            source,
            shard_index,
            dispatch_tx: broadcast::channel(TOPIC_CAPACITY).0,
            receiver_tx: broadcast::channel(TOPIC_CAPACITY).0,
            sender_tx: broadcast::channel(TOPIC_CAPACITY).0,
            control_receiver_tx: broadcast::channel(TOPIC_CAPACITY).0,
            control_sender_tx: broadcast::channel(TOPIC_CAPACITY).0,
            last_sequence: Arc::new(AtomicU64::new(0)),
            session_id: Arc::new(RwLock::new(String::new())),
        }
    }
}

#[async_trait]
impl GatewayClient for DownstreamGatewayClient {
    /// The URL is ignored: the leader holds the connection. This runs the
    /// four relay pipelines until the broker ends or fails.
    async fn execute(&self, _gateway_url: &str) -> GatewayResult<()> {
        let inbound = async {
            let receiver_tx = self.receiver_tx.clone();
            let dispatch_tx = self.dispatch_tx.clone();
            let last_sequence = self.last_sequence.clone();
            let session_id = self.session_id.clone();
            self.source
                .receive(Box::new(move |payload| {
                    if let Some(sequence) = payload.s {
                        last_sequence.store(sequence, Ordering::SeqCst);
                    }
                    if let Some(new_session) = payload.ready_session_id() {
                        tracing::info!(session_id = %new_session, "session ready via relay");
                        *session_id.write().expect("session lock poisoned") = new_session;
                    }
                    if let Some(event) = DispatchEvent::from_payload(&payload) {
                        let _ = dispatch_tx.send(event);
                    }
                    let _ = receiver_tx.send(payload);
                    futures_util::future::ready(Ok(())).boxed()
                }))
                .await
                .map_err(GatewayError::from)
        };

        let control_in = async {
            let control_receiver_tx = self.control_receiver_tx.clone();
            self.source
                .receive_control(Box::new(move |control| {
                    let _ = control_receiver_tx.send(control);
                    futures_util::future::ready(Ok(())).boxed()
                }))
                .await
                .map_err(GatewayError::from)
        };

        let outbound = async {
            self.sink
                .send(broadcast_stream(self.sender_tx.subscribe()))
                .await
                .map_err(GatewayError::from)
        };

        let control_out = async {
            self.sink
                .send_control(broadcast_stream(self.control_sender_tx.subscribe()))
                .await
                .map_err(GatewayError::from)
        };

        tracing::info!(shard = self.shard_index, "downstream gateway client running");
        tokio::try_join!(inbound, control_in, outbound, control_out).map(|_| ())
    }

    /// Request a remote close: push the control upstream, then wait for the
    /// matching operation to come back as acknowledgment.
    async fn close(&self, reconnect: bool) -> GatewayResult<()> {
        let request = if reconnect {
            NodeControl::reconnect(self.shard_index)
        } else {
            NodeControl::close(self.shard_index)
        };
        let expected = request.op;

        // subscribe before sending so the ack cannot slip past
        let mut acks = self.control_receiver_tx.subscribe();
        self.control_sender_tx
            .send(request)
            .map_err(|_| GatewayError::Broker(BrokerError::Closed))?;

        loop {
            match acks.recv().await {
                Ok(control) if control.op == expected => return Ok(()),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(GatewayError::Broker(BrokerError::Closed));
                }
            }
        }
    }

    fn dispatch(&self) -> broadcast::Receiver<DispatchEvent> {
        self.dispatch_tx.subscribe()
    }

    fn receiver(&self) -> broadcast::Receiver<GatewayPayload> {
        self.receiver_tx.subscribe()
    }

    fn sender(&self) -> broadcast::Sender<GatewayPayload> {
        self.sender_tx.clone()
    }

    fn session_id(&self) -> String {
        self.session_id
            .read()
            .expect("session lock poisoned")
            .clone()
    }

    fn sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        // TODO: derive from a control-plane heartbeat once the leader
        // publishes one
        true
    }

    fn response_time(&self) -> Duration {
        Duration::ZERO
    }
}
