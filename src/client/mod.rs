//! RPC client for sending requests and awaiting correlated responses.
//!
//! One [`RpcClient`] owns one logical connection. Requests are written as
//! `{"id", "cmd", "params"}` frames; a background supervisor task reads
//! inbound frames, completes the pending request whose id matches, and
//! re-opens the transport when the connection drops.
mod events;
mod pending;

pub use events::{EventSubscription, ListenerInfo};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

use crate::protocol::{InboundFrame, Reply, RequestFrame, RequestId};
use crate::request_id::RequestIdAllocator;
use crate::retry::retry_with_backoff;
use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    ClientConfig,
    ConnectionState,
    Link,
    Result,
    RpcError,
    TransportPtr,
};
use events::EventListeners;
use pending::PendingRequests;

/// Acquire mutex guard, ignoring poisoning
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Request/response client over one persistent connection.
///
/// Many requests can be in flight concurrently; each is identified by a
/// sequential [`RequestId`] and completed by the response carrying the same
/// id. `RpcClient` is cheap to clone; clones share the connection. The
/// connection is torn down by [`close`](Self::close) or when the last clone
/// is dropped.
///
/// # Example
///
/// ```no_run
/// use ws_rpc::{ClientConfig, RpcClient};
/// use serde_json::{json, Value};
///
/// # async fn example() -> ws_rpc::Result<()> {
/// let client = RpcClient::connect_websocket(ClientConfig::new("ws://localhost:8080")).await?;
///
/// let echoed: Value = client.send("Echo.run", &json!({"x": 1})).await?;
/// assert_eq!(echoed, json!({"x": 1}));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
    supervisor: Arc<SupervisorGuard>,
}

struct Inner {
    transport: TransportPtr,
    config: ClientConfig,
    ids: RequestIdAllocator,
    pending: Mutex<PendingRequests>,
    listeners: Mutex<EventListeners>,

    // Writer side of the current connection; `None` while disconnected
    outbox: Mutex<Option<mpsc::Sender<String>>>,
    state: watch::Sender<ConnectionState>,
    closed: AtomicBool,
}

/// Aborts the supervisor task once the last client clone is gone.
struct SupervisorGuard {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SupervisorGuard {
    fn take(&self) -> Option<JoinHandle<()>> {
        lock_ignore_poison(&self.task).take()
    }
}

impl Drop for SupervisorGuard {
    fn drop(&mut self) {
        if let Some(task) = self.take() {
            task.abort();
        }
    }
}

impl RpcClient {
    // ---

    /// Open the transport and start the connection supervisor.
    ///
    /// Resolves once the connection is open.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the first connection attempt fails.
    /// Later failures are handled by the reconnect policy instead.
    pub async fn connect(config: ClientConfig, transport: TransportPtr) -> Result<Self> {
        // ---
        let (state, _) = watch::channel(ConnectionState::Connecting);

        let inner = Arc::new(Inner {
            transport,
            config,
            ids: RequestIdAllocator::new(),
            pending: Mutex::new(PendingRequests::new()),
            listeners: Mutex::new(EventListeners::new()),
            outbox: Mutex::new(None),
            state,
            closed: AtomicBool::new(false),
        });

        let link = match inner.transport.connect().await {
            Ok(link) => link,
            Err(err) => {
                log_error!("{}: connect failed: {err}", inner.transport.endpoint());
                inner.state.send_replace(ConnectionState::Closed);
                return Err(err);
            }
        };

        log_info!("{}: connected", inner.transport.endpoint());
        let inbox = inner.attach(link);

        let task = tokio::spawn(supervise(inner.clone(), inbox));

        Ok(Self {
            inner,
            supervisor: Arc::new(SupervisorGuard {
                task: Mutex::new(Some(task)),
            }),
        })
    }

    /// Connect over WebSocket to `config.url`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidConfig`] for a non-WebSocket URL, or the
    /// handshake error if the first connection attempt fails.
    #[cfg(feature = "transport_websocket")]
    pub async fn connect_websocket(config: ClientConfig) -> Result<Self> {
        // ---
        let transport = crate::create_websocket_transport(config.url.clone())?;
        Self::connect(config, transport).await
    }

    /// Send a request and wait for its correlated response.
    ///
    /// Uses `ClientConfig::request_timeout` when set; otherwise waits
    /// indefinitely, including across reconnects.
    ///
    /// # Errors
    ///
    /// - [`RpcError::NotConnected`] if the connection is not open within
    ///   `connect_grace`
    /// - [`RpcError::Server`] if the server answered with an `error` frame
    /// - [`RpcError::Timeout`] if a configured timeout elapsed
    /// - [`RpcError::Closed`] if the client was closed
    /// - [`RpcError::Serialization`] if params or payload don't (de)serialize
    pub async fn send<P, T>(&self, command: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // ---
        let payload = self
            .inner
            .request(command, params, self.inner.config.request_timeout, |_| {})
            .await?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Send a request with an explicit response timeout.
    ///
    /// Overrides `ClientConfig::request_timeout` for this single request.
    /// The pending entry is removed when the timeout elapses.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_with_timeout<P, T>(
        &self,
        command: &str,
        params: &P,
        timeout: Duration,
    ) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // ---
        let payload = self
            .inner
            .request(command, params, Some(timeout), |_| {})
            .await?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// True while the connection is open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Number of requests still awaiting a response.
    pub fn pending_count(&self) -> usize {
        lock_ignore_poison(&self.inner.pending).len()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Requests still in flight fail with [`RpcError::Closed`]; event
    /// subscriptions stop receiving. Closing twice is a no-op.
    pub async fn close(&self) {
        // ---
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(task) = self.supervisor.take() {
            task.abort();
            let _ = task.await;
        }

        self.inner.detach();
        self.inner.state.send_replace(ConnectionState::Closed);

        lock_ignore_poison(&self.inner.pending).clear();
        lock_ignore_poison(&self.inner.listeners).clear();

        log_info!("{}: client closed", self.inner.transport.endpoint());
    }
}

impl Inner {
    // ---

    /// Install a freshly opened link; returns its inbox for the supervisor.
    fn attach(&self, link: Link) -> mpsc::Receiver<String> {
        // ---
        *lock_ignore_poison(&self.outbox) = Some(link.outbox);
        self.state.send_replace(ConnectionState::Open);
        link.inbox
    }

    /// Drop the writer side of the current connection, closing it.
    fn detach(&self) {
        lock_ignore_poison(&self.outbox).take();
    }

    fn forget(&self, request_id: RequestId) {
        lock_ignore_poison(&self.pending).remove(request_id);
    }

    fn encode<P>(&self, request_id: RequestId, command: &str, params: &P) -> Result<String>
    where
        P: Serialize + ?Sized,
    {
        // ---
        let frame = RequestFrame {
            id: request_id,
            cmd: command,
            params,
            password: self.config.password.as_deref(),
        };
        Ok(serde_json::to_string(&frame)?)
    }

    /// Send one request and wait for its reply.
    ///
    /// `on_id` runs with the allocated id before the frame is written, so
    /// anything keyed by that id is in place before the reply can arrive.
    async fn request<P>(
        &self,
        command: &str,
        params: &P,
        timeout: Option<Duration>,
        on_id: impl FnOnce(RequestId),
    ) -> Result<Value>
    where
        P: Serialize + ?Sized,
    {
        // ---
        let outbox = self.wait_open().await?;

        let request_id = self.ids.next_id();
        let text = self.encode(request_id, command, params)?;

        on_id(request_id);
        let rx = lock_ignore_poison(&self.pending).register(request_id);

        // close() may have cleared the pending map after wait_open returned
        if self.closed.load(Ordering::SeqCst) {
            self.forget(request_id);
            return Err(RpcError::Closed);
        }

        if outbox.send(text).await.is_err() {
            // Connection dropped between the state check and the write
            self.forget(request_id);
            return Err(RpcError::NotConnected);
        }

        log_debug!("request {request_id} sent: {command}");

        let reply = match timeout {
            Some(duration) => match time::timeout(duration, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.forget(request_id);
                    return Err(RpcError::Timeout);
                }
            },
            None => rx.await,
        };

        // Sender only disappears when the client is closed
        match reply.map_err(|_| RpcError::Closed)? {
            Reply::Response(payload) => Ok(payload),
            Reply::Error(message) => Err(RpcError::Server(message)),
        }
    }

    async fn wait_open(&self) -> Result<mpsc::Sender<String>> {
        // ---
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::Closed);
        }

        let mut state = self.state.subscribe();
        let opened = matches!(
            time::timeout(
                self.config.connect_grace,
                state.wait_for(|s| *s != ConnectionState::Connecting),
            )
            .await,
            Ok(Ok(s)) if *s == ConnectionState::Open
        );

        let outbox = if opened {
            lock_ignore_poison(&self.outbox).clone()
        } else {
            None
        };

        match outbox {
            Some(outbox) => Ok(outbox),
            None if self.closed.load(Ordering::SeqCst) => Err(RpcError::Closed),
            None => Err(RpcError::NotConnected),
        }
    }

    /// Route one inbound text frame.
    ///
    /// Malformed frames and frames for unknown ids are dropped; neither
    /// stops the receive loop.
    fn dispatch(&self, text: &str) {
        // ---
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(_err) => {
                log_warn!("dropping malformed frame: {_err}");
                return;
            }
        };

        match frame {
            InboundFrame::Response {
                request_id,
                payload,
            } => {
                // Listener routes go in before the caller wakes up
                let confirmed = lock_ignore_poison(&self.listeners).confirm(request_id, &payload);
                self.complete(request_id, Reply::Response(payload), confirmed);
            }
            InboundFrame::Error {
                request_id,
                payload,
            } => {
                let unstaged = lock_ignore_poison(&self.listeners).unstage(request_id);
                self.complete(request_id, Reply::error_from_payload(payload), unstaged);
            }
            InboundFrame::Event {
                listener_id,
                payload,
            } => {
                if !lock_ignore_poison(&self.listeners).deliver(listener_id, payload) {
                    log_debug!("no listener for event id: {listener_id}");
                }
            }
        }
    }

    /// `claimed` is true when a listener route already consumed the reply.
    fn complete(&self, request_id: RequestId, reply: Reply, claimed: bool) {
        // ---
        if !lock_ignore_poison(&self.pending).complete(request_id, reply) && !claimed {
            log_debug!("no pending request for id: {request_id}");
        }
    }
}

/// Connection supervisor.
///
/// Reads frames until the connection closes, then reconnects according to
/// the configured policy. Requests in flight at the time of the close stay
/// pending; a response carrying their id on a later connection still
/// completes them. Event listeners are registered again on every new
/// connection.
async fn supervise(inner: Arc<Inner>, mut inbox: mpsc::Receiver<String>) {
    // ---
    let endpoint = inner.transport.endpoint().to_string();

    loop {
        while let Some(text) = inbox.recv().await {
            inner.dispatch(&text);
        }

        inner.detach();
        inner.state.send_replace(ConnectionState::Connecting);
        log_warn!("{endpoint}: connection closed, reconnecting");

        let transport = inner.transport.clone();
        match retry_with_backoff(&inner.config.reconnect, || transport.connect()).await {
            Some(link) => {
                log_info!("{endpoint}: reconnected");
                inbox = inner.attach(link);
                inner.reregister_listeners().await;
            }
            None => {
                log_error!("{endpoint}: giving up on reconnect");
                inner.state.send_replace(ConnectionState::Closed);
                return;
            }
        }
    }
}
