//! Gateway and broker error types

/// Errors from the pub/sub transport bridging leader and workers
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker connection failed
    #[error("broker transport failure: {0}")]
    Transport(String),

    /// A topic message could not be decoded
    #[error("malformed broker message: {0}")]
    Protocol(String),

    /// A local pipeline endpoint went away
    #[error("broker channel closed")]
    Closed,
}

/// Errors surfaced by gateway clients
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("websocket failure: {0}")]
    WebSocket(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// The server violated the gateway protocol
    #[error("gateway protocol violation: {0}")]
    Protocol(String),

    /// The connection ended without a close request from this side
    #[error("gateway connection closed")]
    ConnectionClosed,

    /// `execute` was called while a previous run is still active
    #[error("gateway client is already running")]
    AlreadyRunning,
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
