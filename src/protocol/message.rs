use crate::protocol::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound request frame: `{"id", "cmd", "params"}`.
///
/// `password` is only written when the client was configured with one.
#[derive(Debug, Serialize)]
pub struct RequestFrame<'a, P: ?Sized> {
    pub id: RequestId,
    pub cmd: &'a str,
    pub params: &'a P,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
}

/// Inbound frame, discriminated by its `event` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundFrame {
    /// Successful reply to a request.
    Response {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        #[serde(default)]
        payload: Value,
    },

    /// Failed reply to a request; the payload is the server's message.
    Error {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        #[serde(default)]
        payload: Value,
    },

    /// Server-pushed event for a registered listener.
    Event {
        #[serde(rename = "eventListenerId")]
        listener_id: u64,
        #[serde(default)]
        payload: Value,
    },
}

impl InboundFrame {
    pub fn parse(text: &str) -> crate::Result<Self> {
        // ---
        Ok(serde_json::from_str(text)?)
    }
}

/// Outcome delivered to a pending request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Response(Value),
    Error(String),
}

impl Reply {
    /// Build the error variant from a raw frame payload.
    ///
    /// String payloads are used verbatim; anything else is rendered as JSON.
    pub fn error_from_payload(payload: Value) -> Self {
        // ---
        match payload {
            Value::String(message) => Reply::Error(message),
            other => Reply::Error(other.to_string()),
        }
    }
}
