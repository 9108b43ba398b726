//! WebSocket transport built on `tokio-tungstenite`.
//!
//! Each `connect()` performs a fresh handshake and splits the stream into two
//! tasks:
//!
//! - a writer task draining the link's outbox into the socket
//! - a reader task forwarding text frames into the link's inbox
//!
//! When the socket closes or errors the reader task exits, dropping its end of
//! the inbox channel; that is how the client learns about the close.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    // ---
    log_debug,
    log_warn,
    Link,
    Result,
    RpcError,
    Transport,
    TransportPtr,
};

const CHANNEL_CAPACITY: usize = 256;

struct WebSocketTransport {
    // ---
    url: String,
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    // ---
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<Link> {
        // ---
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut source) = stream.split();

        log_debug!("{}: websocket open", self.url);

        let (out_tx, mut out_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        let url = self.url.clone();
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(_err) = sink.send(Message::Text(text.into())).await {
                    log_warn!("{url}: websocket write failed: {_err}");
                    break;
                }
            }
            // Outbox dropped: the client is done with this connection.
            let _ = sink.close().await;
            log_debug!("{url}: websocket writer stopped");
        });

        let url = self.url.clone();
        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text.as_str().to_owned(),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            log_warn!("{url}: dropping non-utf8 binary frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(_err) => {
                        log_warn!("{url}: websocket read failed: {_err}");
                        break;
                    }
                };

                if in_tx.send(text).await.is_err() {
                    break;
                }
            }
            log_debug!("{url}: websocket reader stopped");
        });

        Ok(Link {
            outbox: out_tx,
            inbox: in_rx,
        })
    }
}

/// Create a WebSocket transport for `url`.
///
/// No connection is made until the client calls `connect()`.
///
/// # Errors
///
/// Returns [`RpcError::InvalidConfig`] unless the URL uses the `ws://` or
/// `wss://` scheme.
pub fn create_websocket_transport(url: impl Into<String>) -> Result<TransportPtr> {
    // ---
    let url = url.into();
    validate_url(&url)?;
    Ok(Arc::new(WebSocketTransport { url }))
}

pub(crate) fn validate_url(url: &str) -> Result<()> {
    // ---
    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))
        .ok_or_else(|| RpcError::InvalidConfig(format!("expected ws:// or wss:// url, got `{url}`")))?;

    if rest.is_empty() {
        return Err(RpcError::InvalidConfig(format!("missing host in `{url}`")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_validate_url() {
        // ---
        assert!(validate_url("ws://127.0.0.1:9000").is_ok());
        assert!(validate_url("wss://example.com/socket").is_ok());
        assert!(matches!(
            validate_url("http://example.com"),
            Err(RpcError::InvalidConfig(_))
        ));
        assert!(validate_url("ws://").is_err());
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        // ---
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = create_websocket_transport(format!("ws://{addr}")).unwrap();
        assert!(transport.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_wss_attempts_tls_handshake() {
        // ---
        use tokio_tungstenite::tungstenite::error::{Error, UrlError};

        // Plain TCP peer that hangs up, so the TLS handshake fails.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let transport = create_websocket_transport(format!("wss://{addr}")).unwrap();
        match transport.connect().await {
            Err(RpcError::WebSocket(err)) => {
                assert!(
                    !matches!(*err, Error::Url(UrlError::TlsFeatureNotEnabled)),
                    "tls support missing: {err}"
                );
            }
            Err(other) => panic!("expected websocket error, got {other:?}"),
            Ok(_) => panic!("handshake with a plain tcp peer succeeded"),
        }
    }
}
