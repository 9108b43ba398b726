// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the domain-level transport interface used by the
//! client to exchange text frames with a server. It intentionally avoids any
//! reference to concrete socket libraries.
//!
//! The transport layer is responsible only for opening a full-duplex
//! connection and moving opaque text frames across it. Higher-level semantics
//! such as request correlation, reconnects, or timeouts are handled by the
//! client.
//!
//! Concrete implementations of this interface live under `src/transport/`.
use crate::Result;
use std::sync::Arc;

use tokio::sync::mpsc;

/// Lifecycle state of the client's logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    // ---
    /// A connection attempt is in progress (initial or reconnect).
    Connecting,

    /// The connection is open and frames can be written.
    Open,

    /// No connection. Either between reconnect attempts, after the reconnect
    /// policy gave up, or after an explicit `close()`.
    Closed,
}

/// One open full-duplex connection.
///
/// The connection is considered closed once `inbox` yields `None`. Dropping
/// `outbox` asks the transport to close the underlying socket.
///
/// # Example
///
/// ```no_run
/// # use ws_rpc::create_websocket_transport;
/// # async fn example() -> ws_rpc::Result<()> {
/// let transport = create_websocket_transport("ws://127.0.0.1:9000")?;
/// let mut link = transport.connect().await?;
///
/// link.outbox.send(r#"{"id":0,"cmd":"ping","params":[]}"#.to_string()).await.ok();
/// while let Some(frame) = link.inbox.recv().await {
///     println!("received: {frame}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Link {
    // ---
    /// Frames queued here are written to the socket in order.
    pub outbox: mpsc::Sender<String>,

    /// Text frames read from the socket, in arrival order.
    pub inbox: mpsc::Receiver<String>,
}

/// Transport abstraction.
///
/// A `Transport` knows how to reach one endpoint and hands out a fresh
/// [`Link`] per successful `connect()`. It may be asked to connect many times
/// over the life of a client, once per reconnect.
///
/// Implementations must ensure that:
/// - `connect()` resolves only once the connection is open for writing.
/// - frames written to one `outbox` are delivered in order.
/// - the `inbox` closes when the underlying connection closes, for any reason.
///
/// The in-memory transport serves as the reference implementation of these
/// semantics.
///
/// # Notes
///
/// This trait uses `async_trait`; the expanded documentation may show explicit
/// lifetimes and a boxed `Future`. Consumers should treat methods as normal
/// `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Human-readable endpoint description, used for logging.
    fn endpoint(&self) -> &str;

    /// Open a new connection to the endpoint.
    async fn connect(&self) -> Result<Link>;
}

/// Shared transport pointer.
///
/// This is an `Arc<dyn Transport>`, which means:
/// - `.clone()` is cheap (only increments a reference count)
/// - the client and its reconnect supervisor share the same instance
pub type TransportPtr = Arc<dyn Transport>;
