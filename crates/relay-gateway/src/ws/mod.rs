//! Locally-connected gateway client
//!
//! A thin keep-alive loop over the gateway WebSocket: Hello establishes the
//! heartbeat cadence, Identify (or Resume, when session state survives a
//! drop) opens the session, and a single select loop pumps inbound payloads,
//! outbound commands and the heartbeat timer.

use crate::client::{DispatchEvent, GatewayClient};
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{GatewayPayload, OpCode};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const TOPIC_CAPACITY: usize = 256;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

struct SessionState {
    sequence: AtomicU64,
    session_id: RwLock<String>,
    connected: AtomicBool,
    running: AtomicBool,
    response_time_ms: AtomicU64,
}

/// Gateway client holding the real WebSocket connection
pub struct DefaultGatewayClient {
    token: String,
    shard_index: u32,
    shard_count: u32,
    state: Arc<SessionState>,
    dispatch_tx: broadcast::Sender<DispatchEvent>,
    receiver_tx: broadcast::Sender<GatewayPayload>,
    sender_tx: broadcast::Sender<GatewayPayload>,
    close_tx: watch::Sender<Option<bool>>,
    close_rx: watch::Receiver<Option<bool>>,
}

impl DefaultGatewayClient {
    /// Create a client for shard 0 of 1
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let (close_tx, close_rx) = watch::channel(None);
        Self {
            token: token.into(),
            shard_index: 0,
            shard_count: 1,
            state: Arc::new(SessionState {
                sequence: AtomicU64::new(0),
                session_id: RwLock::new(String::new()),
                connected: AtomicBool::new(false),
                running: AtomicBool::new(false),
                response_time_ms: AtomicU64::new(0),
            }),
            dispatch_tx: broadcast::channel(TOPIC_CAPACITY).0,
            receiver_tx: broadcast::channel(TOPIC_CAPACITY).0,
            sender_tx: broadcast::channel(TOPIC_CAPACITY).0,
            close_tx,
            close_rx,
        }
    }

    /// Identify as the given shard
    #[must_use]
    pub fn with_shard(mut self, shard_index: u32, shard_count: u32) -> Self {
        self.shard_index = shard_index;
        self.shard_count = shard_count.max(1);
        self
    }

    /// Create a client for the configured shard
    #[must_use]
    pub fn from_config(config: &relay_common::GatewayConfig, token: impl Into<String>) -> Self {
        Self::new(token).with_shard(config.shard_index, config.shard_count)
    }

    fn forget_session(&self) {
        self.state
            .session_id
            .write()
            .expect("session lock poisoned")
            .clear();
        self.state.sequence.store(0, Ordering::SeqCst);
    }

    /// Apply one inbound payload to local state and hand it to the topics.
    /// Returns a payload to send back, if the server asked for one.
    fn accept(
        &self,
        payload: GatewayPayload,
        heartbeat_sent: &mut Option<Instant>,
    ) -> GatewayResult<Option<GatewayPayload>> {
        if let Some(sequence) = payload.s {
            self.state.sequence.store(sequence, Ordering::SeqCst);
        }
        let _ = self.receiver_tx.send(payload.clone());

        match payload.op {
            OpCode::Dispatch => {
                if let Some(session_id) = payload.ready_session_id() {
                    tracing::info!(session_id = %session_id, "gateway session ready");
                    *self
                        .state
                        .session_id
                        .write()
                        .expect("session lock poisoned") = session_id;
                }
                if let Some(event) = DispatchEvent::from_payload(&payload) {
                    let _ = self.dispatch_tx.send(event);
                }
                Ok(None)
            }
            OpCode::Heartbeat => {
                // the server may request an immediate heartbeat
                let sequence = self.state.sequence.load(Ordering::SeqCst);
                Ok(Some(GatewayPayload::heartbeat(
                    (sequence > 0).then_some(sequence),
                )))
            }
            OpCode::HeartbeatAck => {
                if let Some(sent) = heartbeat_sent.take() {
                    self.state
                        .response_time_ms
                        .store(sent.elapsed().as_millis() as u64, Ordering::SeqCst);
                }
                Ok(None)
            }
            OpCode::Reconnect => {
                tracing::info!("server requested reconnect");
                Err(GatewayError::ConnectionClosed)
            }
            OpCode::InvalidSession => {
                let resumable = payload.d.as_ref().and_then(|d| d.as_bool()).unwrap_or(false);
                if !resumable {
                    self.forget_session();
                }
                tracing::warn!(resumable, "session invalidated");
                Err(GatewayError::ConnectionClosed)
            }
            _ => Ok(None),
        }
    }

    async fn run(&self, gateway_url: &str) -> GatewayResult<()> {
        let _ = self.close_tx.send(None);

        let (socket, _) = connect_async(gateway_url)
            .await
            .map_err(|e| GatewayError::WebSocket(e.to_string()))?;
        let (mut write, mut read) = socket.split();

        // first meaningful message must be Hello
        let hello = loop {
            match read.next().await {
                None => return Err(GatewayError::ConnectionClosed),
                Some(Err(e)) => return Err(GatewayError::WebSocket(e.to_string())),
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<GatewayPayload>(&text)
                {
                    Ok(payload) if payload.op == OpCode::Hello => break payload,
                    Ok(payload) => {
                        tracing::debug!(payload = %payload, "ignoring pre-hello payload");
                    }
                    Err(e) => tracing::warn!(error = %e, "dropping malformed gateway payload"),
                },
                Some(Ok(_)) => {}
            }
        };
        let interval_ms = hello
            .heartbeat_interval()
            .ok_or_else(|| GatewayError::Protocol("hello without heartbeat_interval".into()))?;

        let session_id = self
            .state
            .session_id
            .read()
            .expect("session lock poisoned")
            .clone();
        let sequence = self.state.sequence.load(Ordering::SeqCst);
        let opening = if session_id.is_empty() {
            GatewayPayload::identify(&self.token, self.shard_index, self.shard_count)
        } else {
            GatewayPayload::resume(&self.token, &session_id, sequence)
        };
        send_payload(&mut write, &opening).await?;

        self.state.connected.store(true, Ordering::SeqCst);
        tracing::info!(shard = self.shard_index, "gateway connected");

        let period = Duration::from_millis(interval_ms.max(1));
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let mut heartbeat_sent: Option<Instant> = None;
        let mut sender_rx = self.sender_tx.subscribe();
        let mut close_rx = self.close_rx.clone();

        loop {
            tokio::select! {
                message = read.next() => match message {
                    None => return Err(GatewayError::ConnectionClosed),
                    Some(Err(e)) => return Err(GatewayError::WebSocket(e.to_string())),
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<GatewayPayload>(&text) {
                            Ok(payload) => {
                                if let Some(reply) = self.accept(payload, &mut heartbeat_sent)? {
                                    send_payload(&mut write, &reply).await?;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "dropping malformed gateway payload"),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write
                            .send(Message::Pong(data))
                            .await
                            .map_err(|e| GatewayError::WebSocket(e.to_string()))?;
                    }
                    Some(Ok(Message::Close(_))) => return Err(GatewayError::ConnectionClosed),
                    Some(Ok(_)) => {}
                },
                outbound = sender_rx.recv() => match outbound {
                    Ok(payload) => send_payload(&mut write, &payload).await?,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "outbound payloads dropped, keeping latest");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(GatewayError::ConnectionClosed);
                    }
                },
                _ = heartbeat.tick() => {
                    let sequence = self.state.sequence.load(Ordering::SeqCst);
                    heartbeat_sent = Some(Instant::now());
                    send_payload(
                        &mut write,
                        &GatewayPayload::heartbeat((sequence > 0).then_some(sequence)),
                    )
                    .await?;
                },
                _ = close_rx.changed() => {
                    let reconnect = close_rx.borrow().unwrap_or(false);
                    if !reconnect {
                        self.forget_session();
                    }
                    let _ = write.send(Message::Close(None)).await;
                    tracing::info!(shard = self.shard_index, reconnect, "gateway closed on request");
                    return Ok(());
                },
            }
        }
    }
}

async fn send_payload(write: &mut WsSink, payload: &GatewayPayload) -> GatewayResult<()> {
    let text =
        serde_json::to_string(payload).map_err(|e| GatewayError::Protocol(e.to_string()))?;
    write
        .send(Message::Text(text))
        .await
        .map_err(|e| GatewayError::WebSocket(e.to_string()))
}

#[async_trait]
impl GatewayClient for DefaultGatewayClient {
    async fn execute(&self, gateway_url: &str) -> GatewayResult<()> {
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GatewayError::AlreadyRunning);
        }

        let result = self.run(gateway_url).await;

        self.state.connected.store(false, Ordering::SeqCst);
        self.state.running.store(false, Ordering::SeqCst);
        result
    }

    async fn close(&self, reconnect: bool) -> GatewayResult<()> {
        self.close_tx
            .send(Some(reconnect))
            .map_err(|_| GatewayError::ConnectionClosed)?;
        Ok(())
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
        self.state
            .session_id
            .read()
            .expect("session lock poisoned")
            .clone()
    }

    fn sequence(&self) -> u64 {
        self.state.sequence.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    fn response_time(&self) -> Duration {
        Duration::from_millis(self.state.response_time_ms.load(Ordering::SeqCst))
    }
}
