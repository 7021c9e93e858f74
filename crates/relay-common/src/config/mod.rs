//! Configuration module

mod client_config;

pub use client_config::{ApiConfig, BrokerConfig, ClientConfig, ConfigError, GatewayConfig};
