//! RPC client builder.
//!
//! Provides a fluent builder API for configuring and connecting an
//! [`RpcClient`] with reconnect and timeout settings.

use crate::{ClientConfig, ReconnectPolicy, Result, RpcClient, RpcError, TransportPtr};
use std::time::Duration;

/// Builder for connected RPC clients.
///
/// Either a URL (WebSocket transport) or an explicit transport must be
/// given. All other settings are optional.
///
/// # Examples
///
/// ## WebSocket client with bounded exponential reconnect
/// ```no_run
/// use ws_rpc::RpcClientBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> ws_rpc::Result<()> {
/// let client = RpcClientBuilder::new()
///     .url("ws://localhost:8080")
///     .password("secret")
///     .reconnect_max_attempts(20)
///     .reconnect_multiplier(2.0)
///     .reconnect_initial_delay(Duration::from_millis(200))
///     .reconnect_max_delay(Duration::from_secs(10))
///     .request_timeout(Duration::from_secs(5))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// ## In-memory client
/// ```no_run
/// use ws_rpc::{create_memory_transport, RpcClientBuilder};
///
/// # async fn example() -> ws_rpc::Result<()> {
/// let (transport, _server) = create_memory_transport();
/// let client = RpcClientBuilder::new().transport(transport).connect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct RpcClientBuilder {
    // ---
    url: Option<String>,
    transport: Option<TransportPtr>,
    password: Option<String>,
    connect_grace: Option<Duration>,
    request_timeout: Option<Duration>,

    // Reconnect configuration (all optional)
    reconnect_max_attempts: Option<u32>,
    reconnect_multiplier: Option<f32>,
    reconnect_initial_delay: Option<Duration>,
    reconnect_max_delay: Option<Duration>,
    reconnect_jitter: bool,
}

impl RpcClientBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// WebSocket endpoint (`ws://` or `wss://`).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Use an explicit transport instead of building one from the URL.
    pub fn transport(mut self, transport: TransportPtr) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Shared secret written into every request frame.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// How long `send` waits for an open connection.
    ///
    /// Default: 1s.
    pub fn connect_grace(mut self, grace: Duration) -> Self {
        self.connect_grace = Some(grace);
        self
    }

    /// Per-request response timeout.
    ///
    /// Default: none.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Give up reconnecting after this many failed attempts.
    ///
    /// Default: unbounded.
    pub fn reconnect_max_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_max_attempts = Some(attempts);
        self
    }

    /// Reconnect backoff multiplier.
    ///
    /// Default: 1.0 (fixed delay).
    pub fn reconnect_multiplier(mut self, multiplier: f32) -> Self {
        self.reconnect_multiplier = Some(multiplier);
        self
    }

    /// Delay before the first reconnect attempt.
    ///
    /// Default: 300ms.
    pub fn reconnect_initial_delay(mut self, delay: Duration) -> Self {
        self.reconnect_initial_delay = Some(delay);
        self
    }

    /// Cap on the reconnect delay.
    ///
    /// Default: the initial delay when the multiplier is 1.0, otherwise 30s.
    pub fn reconnect_max_delay(mut self, delay: Duration) -> Self {
        self.reconnect_max_delay = Some(delay);
        self
    }

    /// Randomize reconnect delays by ±25%.
    pub fn reconnect_jitter(mut self) -> Self {
        self.reconnect_jitter = true;
        self
    }

    /// Assemble the configuration without connecting.
    pub fn config(&self) -> ClientConfig {
        // ---
        let defaults = ReconnectPolicy::default();

        let initial_delay = self
            .reconnect_initial_delay
            .unwrap_or(defaults.initial_delay);
        let multiplier = self.reconnect_multiplier.unwrap_or(defaults.multiplier);

        #[allow(clippy::float_cmp)]
        let max_delay = self.reconnect_max_delay.unwrap_or(if multiplier == 1.0 {
            initial_delay
        } else {
            Duration::from_secs(30)
        });

        let reconnect = ReconnectPolicy {
            max_attempts: self.reconnect_max_attempts,
            multiplier,
            initial_delay,
            max_delay,
            jitter: self.reconnect_jitter,
        };

        ClientConfig {
            url: self.url.clone().unwrap_or_default(),
            password: self.password.clone(),
            connect_grace: self
                .connect_grace
                .unwrap_or(crate::client_config::DEFAULT_CONNECT_GRACE),
            request_timeout: self.request_timeout,
            reconnect,
        }
    }

    /// Connect the client (consumes self).
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidConfig`] when neither a URL nor a transport
    /// was given, or the first connection attempt's error.
    pub async fn connect(self) -> Result<RpcClient> {
        // ---
        let config = self.config();

        let transport = match self.transport {
            Some(transport) => transport,
            None => Self::websocket_transport(&config)?,
        };

        RpcClient::connect(config, transport).await
    }

    #[cfg(feature = "transport_websocket")]
    fn websocket_transport(config: &ClientConfig) -> Result<TransportPtr> {
        // ---
        if config.url.is_empty() {
            return Err(RpcError::InvalidConfig(
                "either url() or transport() is required".into(),
            ));
        }
        crate::create_websocket_transport(config.url.clone())
    }

    #[cfg(not(feature = "transport_websocket"))]
    fn websocket_transport(_config: &ClientConfig) -> Result<TransportPtr> {
        // ---
        Err(RpcError::InvalidConfig(
            "no transport given and the websocket transport is disabled".into(),
        ))
    }
}
