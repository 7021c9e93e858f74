//! Redis sink
//!
//! Publishes relay envelopes to the payload and control topics. Each `send`
//! call drains its source stream to completion; a connection failure
//! terminates the call with the transport error.

use crate::envelope::{ControlEnvelope, PayloadEnvelope};
use crate::RedisBrokerOptions;
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use relay_gateway::{BrokerError, ControlStream, PayloadSink, PayloadStream};

/// Redis-backed [`PayloadSink`]
pub struct RedisPayloadSink {
    options: RedisBrokerOptions,
    connection: ConnectionManager,
}

impl RedisPayloadSink {
    /// Connect to Redis and build the sink
    pub async fn connect(options: RedisBrokerOptions) -> Result<Self, BrokerError> {
        let client = redis::Client::open(options.redis_url.as_str())
            .map_err(|e| BrokerError::Transport(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;

        Ok(Self {
            options,
            connection,
        })
    }

    async fn publish(&self, topic: &str, message: String) -> Result<(), BrokerError> {
        let mut connection = self.connection.clone();
        let receivers: u32 = connection
            .publish(topic, message)
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;

        tracing::trace!(topic = %topic, receivers, "published relay message");
        Ok(())
    }
}

#[async_trait]
impl PayloadSink for RedisPayloadSink {
    async fn send(&self, mut payloads: PayloadStream) -> Result<(), BrokerError> {
        while let Some(payload) = payloads.next().await {
            let envelope = PayloadEnvelope::new(&self.options.shard_key, payload);
            let message = serde_json::to_string(&envelope)
                .map_err(|e| BrokerError::Protocol(e.to_string()))?;
            self.publish(&self.options.payload_topic, message).await?;
        }
        Ok(())
    }

    async fn send_control(&self, mut controls: ControlStream) -> Result<(), BrokerError> {
        while let Some(control) = controls.next().await {
            let envelope = ControlEnvelope::new(&self.options.shard_key, control);
            let message = serde_json::to_string(&envelope)
                .map_err(|e| BrokerError::Protocol(e.to_string()))?;
            self.publish(&self.options.control_topic, message).await?;
        }
        Ok(())
    }
}
