//! Client configuration structs
//!
//! Loads configuration from environment variables.

use serde::Deserialize;
use std::env;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Authentication token presented to the platform
    pub token: String,
    pub api: ApiConfig,
    pub gateway: GatewayConfig,
    pub broker: BrokerConfig,
}

/// REST API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (enforced by the HTTP client)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Gateway (WebSocket) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default)]
    pub shard_index: u32,
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,
}

impl GatewayConfig {
    /// Partition key used when relaying payloads through a broker
    #[must_use]
    pub fn shard_key(&self) -> String {
        format!("{}:{}", self.shard_index, self.shard_count)
    }
}

/// Broker (pub/sub transport) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_payload_topic")]
    pub payload_topic: String,
    #[serde(default = "default_control_topic")]
    pub control_topic: String,
    /// Delay before a dropped broker subscription is reopened
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

// Default value functions
fn default_api_base_url() -> String {
    "https://chat.example.com/api/v1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_gateway_url() -> String {
    "wss://gateway.chat.example.com".to_string()
}

fn default_shard_count() -> u32 {
    1
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_payload_topic() -> String {
    "gateway:payload".to_string()
}

fn default_control_topic() -> String {
    "gateway:control".to_string()
}

fn default_reconnect_delay() -> u64 {
    1000
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            token: env::var("RELAY_TOKEN").map_err(|_| ConfigError::MissingVar("RELAY_TOKEN"))?,
            api: ApiConfig {
                base_url: env::var("RELAY_API_BASE_URL").unwrap_or_else(|_| default_api_base_url()),
                request_timeout_secs: env::var("RELAY_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_request_timeout),
            },
            gateway: GatewayConfig {
                url: env::var("RELAY_GATEWAY_URL").unwrap_or_else(|_| default_gateway_url()),
                shard_index: env::var("RELAY_SHARD_INDEX")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                shard_count: env::var("RELAY_SHARD_COUNT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_shard_count),
            },
            broker: BrokerConfig {
                redis_url: env::var("RELAY_REDIS_URL").unwrap_or_else(|_| default_redis_url()),
                payload_topic: env::var("RELAY_PAYLOAD_TOPIC")
                    .unwrap_or_else(|_| default_payload_topic()),
                control_topic: env::var("RELAY_CONTROL_TOPIC")
                    .unwrap_or_else(|_| default_control_topic()),
                reconnect_delay_ms: env::var("RELAY_BROKER_RECONNECT_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_reconnect_delay),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
