//! Request/response RPC over a single persistent WebSocket connection
//!
//! This library multiplexes many concurrent request/response exchanges over
//! one full-duplex connection. It handles request id allocation, response
//! correlation, server-pushed events, and automatic reconnects.
//!
//! # Wire format
//!
//! - request: `{"id": 0, "cmd": "Echo.run", "params": {...}}`
//! - response: `{"requestId": 0, "event": "response" | "error", "payload": ...}`
//! - event: `{"event": "event", "eventListenerId": 1, "payload": ...}`
//!

// Import all sub modules once...
mod client;
mod domain;
mod macros;
mod protocol;
mod transport;

mod client_builder;
mod client_config;

mod error;
mod request_id;
mod retry;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::{EventSubscription, ListenerInfo, RpcClient};
pub use client_builder::RpcClientBuilder;
pub use client_config::{ClientConfig, DEFAULT_CONNECT_GRACE};

pub use error::{Result, RpcError};
pub use protocol::{InboundFrame, Reply, RequestId};
pub use retry::ReconnectPolicy;

pub use transport::{create_memory_transport, MemoryConnection, MemoryServer};

#[cfg(feature = "transport_websocket")]
pub use transport::create_websocket_transport;

// --- public re-exports
pub use domain::{
    //
    ConnectionState,
    Link,
    Transport,
    TransportPtr,
};
