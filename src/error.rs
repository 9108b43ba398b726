use thiserror::Error;

/// Errors that can occur during RPC operations
#[derive(Error, Debug)]
pub enum RpcError {
    /// The connection was not open within the configured grace period
    #[error("websocket is not connected")]
    NotConnected,

    /// The server answered the request with an `error` frame
    ///
    /// Carries the message the server placed in the frame's payload.
    #[error("{0}")]
    Server(String),

    /// Request timed out waiting for response
    #[error("request timed out")]
    Timeout,

    /// The client was closed explicitly
    #[error("client closed")]
    Closed,

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level failure (channel closed, connection refused, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// WebSocket handshake or protocol failure
    #[cfg(feature = "transport_websocket")]
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(feature = "transport_websocket")]
impl From<tokio_tungstenite::tungstenite::Error> for RpcError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        // ---
        RpcError::WebSocket(Box::new(err))
    }
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;
