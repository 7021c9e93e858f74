//! Leader/worker relay behavior against an in-memory broker.

use async_trait::async_trait;
use futures_util::StreamExt;
use relay_gateway::{
    BrokerError, ControlHandler, ControlStream, DispatchEvent, DownstreamGatewayClient,
    GatewayClient, GatewayPayload, GatewayResult, NodeControl, PayloadHandler, PayloadSink,
    PayloadSource, PayloadStream, UpstreamGatewayClient,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// In-memory broker half: records everything published through the sink and
/// feeds the source from test-controlled channels.
#[derive(Clone)]
struct TestTransport {
    published_payloads: Arc<Mutex<Vec<GatewayPayload>>>,
    published_controls: Arc<Mutex<Vec<NodeControl>>>,
    payload_feed: broadcast::Sender<GatewayPayload>,
    control_feed: broadcast::Sender<NodeControl>,
}

impl TestTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            published_payloads: Arc::new(Mutex::new(Vec::new())),
            published_controls: Arc::new(Mutex::new(Vec::new())),
            payload_feed: broadcast::channel(64).0,
            control_feed: broadcast::channel(64).0,
        })
    }

    fn payloads(&self) -> Vec<GatewayPayload> {
        self.published_payloads.lock().unwrap().clone()
    }

    fn controls(&self) -> Vec<NodeControl> {
        self.published_controls.lock().unwrap().clone()
    }

    /// Wait until both source pipelines have subscribed.
    async fn wired(&self) {
        while self.payload_feed.receiver_count() == 0 || self.control_feed.receiver_count() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[async_trait]
impl PayloadSink for TestTransport {
    async fn send(&self, mut payloads: PayloadStream) -> Result<(), BrokerError> {
        while let Some(payload) = payloads.next().await {
            self.published_payloads.lock().unwrap().push(payload);
        }
        Ok(())
    }

    async fn send_control(&self, mut controls: ControlStream) -> Result<(), BrokerError> {
        while let Some(control) = controls.next().await {
            self.published_controls.lock().unwrap().push(control);
        }
        Ok(())
    }
}

#[async_trait]
impl PayloadSource for TestTransport {
    async fn receive(&self, mut handler: PayloadHandler) -> Result<(), BrokerError> {
        let mut rx = self.payload_feed.subscribe();
        loop {
            match rx.recv().await {
                Ok(payload) => handler(payload).await?,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }

    async fn receive_control(&self, mut handler: ControlHandler) -> Result<(), BrokerError> {
        let mut rx = self.control_feed.subscribe();
        loop {
            match rx.recv().await {
                Ok(control) => handler(control).await?,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }
}

async fn start_worker(transport: &Arc<TestTransport>) -> Arc<DownstreamGatewayClient> {
    let client = Arc::new(DownstreamGatewayClient::new(
        transport.clone(),
        transport.clone(),
        0,
    ));
    let running = client.clone();
    tokio::spawn(async move { running.execute("").await });
    transport.wired().await;
    client
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn sequence_follows_arrival_order() {
    let transport = TestTransport::new();
    let client = start_worker(&transport).await;

    for sequence in [1u64, 2, 3] {
        transport
            .payload_feed
            .send(GatewayPayload::dispatch("MESSAGE_CREATE", sequence, json!({})))
            .unwrap();
    }

    let observer = client.clone();
    eventually(move || observer.sequence() == 3).await;
}

#[tokio::test]
async fn ready_dispatch_sets_session_id() {
    let transport = TestTransport::new();
    let client = start_worker(&transport).await;
    let mut dispatches = client.dispatch();

    transport
        .payload_feed
        .send(GatewayPayload::dispatch(
            "READY",
            1,
            json!({"session_id": "relay-session"}),
        ))
        .unwrap();

    let observer = client.clone();
    eventually(move || observer.session_id() == "relay-session").await;

    let event = dispatches.recv().await.unwrap();
    assert_eq!(event.event_type, "READY");
}

#[tokio::test]
async fn non_dispatch_payloads_reach_receiver_but_not_dispatch() {
    let transport = TestTransport::new();
    let client = start_worker(&transport).await;
    let mut receiver = client.receiver();
    let mut dispatches = client.dispatch();

    transport
        .payload_feed
        .send(GatewayPayload::heartbeat(Some(9)))
        .unwrap();

    let payload = receiver.recv().await.unwrap();
    assert_eq!(payload, GatewayPayload::heartbeat(Some(9)));
    assert!(dispatches.try_recv().is_err());

    // heartbeats carry their sequence inside `d`, not `s`; the local
    // counter is untouched
    assert_eq!(client.sequence(), 0);
}

#[tokio::test]
async fn outbound_commands_are_published() {
    let transport = TestTransport::new();
    let client = start_worker(&transport).await;

    client
        .sender()
        .send(GatewayPayload::presence_update("idle"))
        .unwrap();

    let recorded = transport.clone();
    eventually(move || recorded.payloads().len() == 1).await;
    assert_eq!(
        transport.payloads()[0],
        GatewayPayload::presence_update("idle")
    );
}

#[tokio::test]
async fn close_publishes_one_request_and_awaits_ack() {
    let transport = TestTransport::new();
    let client = start_worker(&transport).await;

    let closing = client.clone();
    let close_task = tokio::spawn(async move { closing.close(false).await });

    let recorded = transport.clone();
    eventually(move || recorded.controls().len() == 1).await;
    assert_eq!(transport.controls()[0], NodeControl::close(0));

    // no ack yet: the close must still be pending
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!close_task.is_finished());

    transport.control_feed.send(NodeControl::close(0)).unwrap();
    close_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn close_ignores_mismatched_control_ops() {
    let transport = TestTransport::new();
    let client = start_worker(&transport).await;

    let closing = client.clone();
    let close_task = tokio::spawn(async move { closing.close(true).await });

    let recorded = transport.clone();
    eventually(move || recorded.controls().len() == 1).await;
    assert_eq!(transport.controls()[0], NodeControl::reconnect(0));

    // a CLOSE ack does not satisfy a RECONNECT request
    transport.control_feed.send(NodeControl::close(0)).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!close_task.is_finished());

    transport
        .control_feed
        .send(NodeControl::reconnect(0))
        .unwrap();
    close_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn closing_twice_queues_two_requests() {
    let transport = TestTransport::new();
    let client = start_worker(&transport).await;

    let first = {
        let c = client.clone();
        tokio::spawn(async move { c.close(false).await })
    };
    let second = {
        let c = client.clone();
        tokio::spawn(async move { c.close(false).await })
    };

    let recorded = transport.clone();
    eventually(move || recorded.controls().len() == 2).await;

    transport.control_feed.send(NodeControl::close(0)).unwrap();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
}

// --- upstream ---

/// Gateway client double: channel topics, no socket.
struct FakeGatewayClient {
    dispatch_tx: broadcast::Sender<DispatchEvent>,
    receiver_tx: broadcast::Sender<GatewayPayload>,
    sender_tx: broadcast::Sender<GatewayPayload>,
    close_calls: Arc<Mutex<Vec<bool>>>,
}

impl FakeGatewayClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            dispatch_tx: broadcast::channel(64).0,
            receiver_tx: broadcast::channel(64).0,
            sender_tx: broadcast::channel(64).0,
            close_calls: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

#[async_trait]
impl GatewayClient for FakeGatewayClient {
    async fn execute(&self, _gateway_url: &str) -> GatewayResult<()> {
        futures_util::future::pending().await
    }

    async fn close(&self, reconnect: bool) -> GatewayResult<()> {
        self.close_calls.lock().unwrap().push(reconnect);
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
        "leader-session".into()
    }

    fn sequence(&self) -> u64 {
        42
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn response_time(&self) -> Duration {
        Duration::from_millis(5)
    }
}

async fn start_leader(
    transport: &Arc<TestTransport>,
) -> (Arc<UpstreamGatewayClient<FakeGatewayClient>>, Arc<FakeGatewayClient>) {
    let fake = FakeGatewayClient::new();
    let leader = Arc::new(UpstreamGatewayClient::new(
        fake.clone(),
        transport.clone(),
        transport.clone(),
    ));
    let running = leader.clone();
    tokio::spawn(async move { running.execute("wss://gateway.test").await });
    transport.wired().await;
    while fake.receiver_tx.receiver_count() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    (leader, fake)
}

#[tokio::test]
async fn leader_relays_inbound_payloads_to_broker() {
    let transport = TestTransport::new();
    let (_leader, fake) = start_leader(&transport).await;

    fake.receiver_tx
        .send(GatewayPayload::dispatch("MESSAGE_CREATE", 1, json!({"id": "1"})))
        .unwrap();

    let recorded = transport.clone();
    eventually(move || recorded.payloads().len() == 1).await;
    assert_eq!(transport.payloads()[0].s, Some(1));
}

#[tokio::test]
async fn leader_injects_worker_commands_into_connection() {
    let transport = TestTransport::new();
    let (_leader, fake) = start_leader(&transport).await;
    let mut outbound = fake.sender_tx.subscribe();

    transport
        .payload_feed
        .send(GatewayPayload::presence_update("dnd"))
        .unwrap();

    let command = outbound.recv().await.unwrap();
    assert_eq!(command, GatewayPayload::presence_update("dnd"));
}

#[tokio::test]
async fn leader_applies_and_echoes_control_requests() {
    let transport = TestTransport::new();
    let (_leader, fake) = start_leader(&transport).await;

    transport
        .control_feed
        .send(NodeControl::reconnect(0))
        .unwrap();

    let recorded = transport.clone();
    eventually(move || recorded.controls().len() == 1).await;
    assert_eq!(transport.controls()[0], NodeControl::reconnect(0));
    assert_eq!(*fake.close_calls.lock().unwrap(), vec![true]);
}

#[tokio::test]
async fn leader_delegates_accessors() {
    let transport = TestTransport::new();
    let (leader, _fake) = start_leader(&transport).await;

    assert_eq!(leader.session_id(), "leader-session");
    assert_eq!(leader.sequence(), 42);
    assert!(leader.is_connected());
    assert_eq!(leader.response_time(), Duration::from_millis(5));
}
