//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Transport` trait. Network transports are hidden behind feature flags
//! and exposed only through constructor functions.
//!
//! Domain code must not depend on transport-specific types.

mod memory;

#[cfg(feature = "transport_websocket")]
mod websocket;

pub use memory::{create_memory_transport, MemoryConnection, MemoryServer};

#[cfg(feature = "transport_websocket")]
pub use websocket::create_websocket_transport;
