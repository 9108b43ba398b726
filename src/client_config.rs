//! Public client configuration.
//!
//! This type intentionally contains no transport-specific concepts beyond the
//! endpoint URL. Transport layers interpret the URL into concrete connection
//! settings.

use std::time::Duration;

use crate::ReconnectPolicy;

/// How long `send` waits for a non-open connection before giving up.
pub const DEFAULT_CONNECT_GRACE: Duration = Duration::from_millis(1000);

/// Client configuration and connection parameters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // ---
    /// Server endpoint (e.g. `"ws://localhost:8080"`).
    ///
    /// Ignored when the client is given an explicit transport.
    pub url: String,

    /// Optional shared secret written into every request frame.
    pub password: Option<String>,

    /// How long `send` waits for the connection to become open.
    ///
    /// Default: 1 second
    pub connect_grace: Duration,

    /// Per-request response timeout.
    ///
    /// `None` waits indefinitely, including across reconnects.
    ///
    /// Default: `None`
    pub request_timeout: Option<Duration>,

    /// Reconnect behavior after an unexpected close.
    ///
    /// Default: retry forever every 300ms
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            password: None,
            connect_grace: DEFAULT_CONNECT_GRACE,
            request_timeout: None,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Create a config for the given endpoint with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the shared secret sent with every request.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set how long `send` waits for an open connection.
    pub fn with_connect_grace(mut self, grace: Duration) -> Self {
        self.connect_grace = grace;
        self
    }

    /// Set a per-request response timeout.
    ///
    /// # Example
    ///
    /// ```
    /// use ws_rpc::ClientConfig;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::new("ws://localhost:8080")
    ///     .with_request_timeout(Duration::from_secs(10));
    /// ```
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Replace the reconnect policy.
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}
