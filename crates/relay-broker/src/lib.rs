//! # relay-broker
//!
//! Redis pub/sub implementation of the gateway relay's
//! [`PayloadSink`](relay_gateway::PayloadSink) /
//! [`PayloadSource`](relay_gateway::PayloadSource) contract. Payloads and
//! control messages travel as JSON envelopes on a configurable topic pair,
//! keyed by shard for partitioning.

pub mod envelope;

mod publisher;
mod subscriber;

pub use envelope::{ControlEnvelope, PayloadEnvelope};
pub use publisher::RedisPayloadSink;
pub use subscriber::RedisPayloadSource;

use relay_common::BrokerConfig;

/// Topic pair and partition key shared by both broker halves
#[derive(Debug, Clone)]
pub struct RedisBrokerOptions {
    pub redis_url: String,
    pub payload_topic: String,
    pub control_topic: String,
    /// Partition key, conventionally `"<shardIndex>:<shardCount>"`
    pub shard_key: String,
    /// Delay before a dropped subscription is reopened
    pub reconnect_delay_ms: u64,
}

impl RedisBrokerOptions {
    /// Build options from configuration for the given shard
    #[must_use]
    pub fn from_config(config: &BrokerConfig, shard_key: impl Into<String>) -> Self {
        Self {
            redis_url: config.redis_url.clone(),
            payload_topic: config.payload_topic.clone(),
            control_topic: config.control_topic.clone(),
            shard_key: shard_key.into(),
            reconnect_delay_ms: config.reconnect_delay_ms,
        }
    }
}
