/// Protocol types for request/response correlation and serialization
///
/// This module defines the JSON wire format for request, response and
/// event frames.
mod message;

pub use crate::request_id::RequestId;
pub use message::{InboundFrame, Reply, RequestFrame};
