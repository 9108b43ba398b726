//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. It is intended primarily for testing, local execution,
//! and as a reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! The in-memory transport defines the **reference behavior** for the transport
//! layer. The WebSocket transport is expected to approximate this behavior as
//! closely as the network allows.
//!
//! In particular, the in-memory transport establishes the following expectations:
//!
//! - `connect()` returns only after the server side has been handed the new
//!   connection.
//! - Frames are delivered in order, without loss, within a single process.
//! - Dropping the server side of a connection closes the client's inbox, which
//!   is exactly what a socket close looks like to the client.
//!
//! ## Non-Goals
//!
//! This transport does not emulate WebSocket framing, TLS, or network latency.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::{
    // ---
    log_debug,
    Link,
    RequestId,
    Result,
    RpcError,
    Transport,
    TransportPtr,
};

const CHANNEL_CAPACITY: usize = 64;

struct Shared {
    online: AtomicBool,
    attempts: AtomicUsize,
    accept_tx: mpsc::UnboundedSender<MemoryConnection>,
}

/// Server side of the in-memory transport.
///
/// Receives one [`MemoryConnection`] per successful client `connect()`.
///
/// # ⚠️  Testing Only - Subject to Change
///
/// **This type is exposed for integration tests and local experiments.**
/// Production code should use [`create_websocket_transport`](crate::create_websocket_transport).
pub struct MemoryServer {
    // ---
    shared: Arc<Shared>,
    accept_rx: mpsc::UnboundedReceiver<MemoryConnection>,
}

impl MemoryServer {
    /// Wait for the next client connection.
    ///
    /// Returns `None` once every transport handle has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryConnection> {
        self.accept_rx.recv().await
    }

    /// Accept or refuse subsequent `connect()` calls.
    ///
    /// Live connections are not affected; drop them to simulate a close.
    pub fn set_online(&self, online: bool) {
        self.shared.online.store(online, Ordering::SeqCst);
    }

    /// Number of `connect()` calls seen so far, refused ones included.
    pub fn connect_attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

/// Server side of one in-memory connection.
pub struct MemoryConnection {
    // ---
    /// Frames written by the client.
    pub inbox: mpsc::Receiver<String>,

    /// Frames queued here are delivered to the client.
    pub outbox: mpsc::Sender<String>,
}

impl MemoryConnection {
    /// Read the next client frame and parse it as JSON.
    ///
    /// Returns `None` when the client side closed or wrote invalid JSON.
    pub async fn recv_json(&mut self) -> Option<Value> {
        // ---
        let text = self.inbox.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Send a raw text frame to the client.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        // ---
        self.outbox
            .send(text.into())
            .await
            .map_err(|_| RpcError::Transport("client side of memory connection closed".into()))
    }

    /// Send a `response` frame for `request_id`.
    pub async fn respond(&self, request_id: RequestId, payload: Value) -> Result<()> {
        // ---
        let frame = json!({"requestId": request_id, "event": "response", "payload": payload});
        self.send_text(frame.to_string()).await
    }

    /// Send an `error` frame for `request_id`.
    pub async fn fail(&self, request_id: RequestId, message: &str) -> Result<()> {
        // ---
        let frame = json!({"requestId": request_id, "event": "error", "payload": message});
        self.send_text(frame.to_string()).await
    }

    /// Push an `event` frame to listener `listener_id`.
    pub async fn push_event(&self, listener_id: u64, payload: Value) -> Result<()> {
        // ---
        let frame = json!({"event": "event", "eventListenerId": listener_id, "payload": payload});
        self.send_text(frame.to_string()).await
    }
}

/// In-memory transport.
///
/// Each `connect()` creates a fresh pair of channels and hands the server
/// half to the paired [`MemoryServer`].
struct MemoryTransport {
    // ---
    shared: Arc<Shared>,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    fn endpoint(&self) -> &str {
        "memory://"
    }

    async fn connect(&self) -> Result<Link> {
        // ---
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);

        if !self.shared.online.load(Ordering::SeqCst) {
            log_debug!("memory transport: connection refused");
            return Err(RpcError::Transport("connection refused".into()));
        }

        let (client_tx, server_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (server_tx, client_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let server_side = MemoryConnection {
            inbox: server_rx,
            outbox: server_tx,
        };

        self.shared
            .accept_tx
            .send(server_side)
            .map_err(|_| RpcError::Transport("memory server dropped".into()))?;

        log_debug!("memory transport: connection open");

        Ok(Link {
            outbox: client_tx,
            inbox: client_rx,
        })
    }
}

/// Create a new in-memory transport and its server side.
///
/// The server starts online.
pub fn create_memory_transport() -> (TransportPtr, MemoryServer) {
    // ---
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();

    let shared = Arc::new(Shared {
        online: AtomicBool::new(true),
        attempts: AtomicUsize::new(0),
        accept_tx,
    });

    let transport = MemoryTransport {
        shared: shared.clone(),
    };

    (Arc::new(transport), MemoryServer { shared, accept_rx })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_connect_hands_server_side() {
        // ---
        let (transport, mut server) = create_memory_transport();

        let mut link = transport.connect().await.expect("connect failed");
        let mut conn = server.accept().await.expect("no connection");

        link.outbox.send("hello".into()).await.unwrap();
        assert_eq!(conn.inbox.recv().await.as_deref(), Some("hello"));

        conn.send_text("world").await.unwrap();
        assert_eq!(link.inbox.recv().await.as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn test_offline_refuses_and_counts_attempts() {
        // ---
        let (transport, server) = create_memory_transport();
        server.set_online(false);

        assert!(matches!(
            transport.connect().await,
            Err(RpcError::Transport(_))
        ));
        assert!(transport.connect().await.is_err());
        assert_eq!(server.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_dropping_server_side_closes_client_inbox() {
        // ---
        let (transport, mut server) = create_memory_transport();

        let mut link = transport.connect().await.unwrap();
        let conn = server.accept().await.unwrap();
        drop(conn);

        let closed = timeout(Duration::from_millis(100), link.inbox.recv())
            .await
            .expect("inbox did not close");
        assert!(closed.is_none());
    }
}
