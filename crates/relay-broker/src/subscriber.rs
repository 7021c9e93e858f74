//! Redis source
//!
//! Subscribes to a relay topic and feeds decoded envelopes to the caller's
//! handler. Malformed messages are logged and dropped so one bad publisher
//! cannot stall the pipeline. A dropped connection or ended message stream
//! is reopened after the configured delay; only a handler failure ends the
//! call, since that means the local pipeline went away.

use crate::envelope::{ControlEnvelope, PayloadEnvelope};
use crate::RedisBrokerOptions;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use relay_gateway::{BrokerError, ControlHandler, PayloadHandler, PayloadSource};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Why one subscription attempt stopped
enum SubscriptionEnd {
    /// Connection failed or the message stream ran dry; worth retrying
    Transport(BrokerError),
    /// The caller's handler failed; not retriable
    Handler(BrokerError),
}

/// Redis-backed [`PayloadSource`]
pub struct RedisPayloadSource {
    options: RedisBrokerOptions,
}

impl RedisPayloadSource {
    #[must_use]
    pub fn new(options: RedisBrokerOptions) -> Self {
        Self { options }
    }

    /// Keep a subscription alive: reopen it after the configured delay
    /// whenever the connection drops.
    async fn subscribe_loop<T, F>(&self, topic: &str, mut deliver: F) -> Result<(), BrokerError>
    where
        T: DeserializeOwned,
        F: FnMut(T) -> BoxFuture<'static, Result<(), BrokerError>> + Send,
    {
        let delay = Duration::from_millis(self.options.reconnect_delay_ms);
        loop {
            match self.run_subscription(topic, &mut deliver).await {
                Ok(()) => {
                    tracing::warn!(topic = %topic, "relay subscription ended, reconnecting");
                }
                Err(SubscriptionEnd::Handler(e)) => return Err(e),
                Err(SubscriptionEnd::Transport(e)) => {
                    tracing::error!(topic = %topic, error = %e, "relay subscription failed, reconnecting");
                }
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// One subscription attempt: connect, subscribe, pump messages until
    /// the stream ends or something fails.
    async fn run_subscription<T, F>(
        &self,
        topic: &str,
        deliver: &mut F,
    ) -> Result<(), SubscriptionEnd>
    where
        T: DeserializeOwned,
        F: FnMut(T) -> BoxFuture<'static, Result<(), BrokerError>> + Send,
    {
        let transport = |e: redis::RedisError| {
            SubscriptionEnd::Transport(BrokerError::Transport(e.to_string()))
        };

        let client = redis::Client::open(self.options.redis_url.as_str()).map_err(transport)?;
        let mut pubsub = client.get_async_pubsub().await.map_err(transport)?;
        pubsub.subscribe(topic).await.map_err(transport)?;

        tracing::info!(topic = %topic, "subscribed to relay topic");

        let mut stream = pubsub.on_message();
        while let Some(message) = stream.next().await {
            let text: String = match message.get_payload() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "unreadable relay message, dropping");
                    continue;
                }
            };
            match serde_json::from_str::<T>(&text) {
                Ok(envelope) => deliver(envelope).await.map_err(SubscriptionEnd::Handler)?,
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "malformed relay message, dropping");
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PayloadSource for RedisPayloadSource {
    async fn receive(&self, mut handler: PayloadHandler) -> Result<(), BrokerError> {
        let topic = self.options.payload_topic.clone();
        self.subscribe_loop(&topic, move |e: PayloadEnvelope| handler(e.payload))
            .await
    }

    async fn receive_control(&self, mut handler: ControlHandler) -> Result<(), BrokerError> {
        let topic = self.options.control_topic.clone();
        self.subscribe_loop(&topic, move |e: ControlEnvelope| handler(e.control))
            .await
    }
}
