// tests/common/mod.rs

#![allow(dead_code)]

use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use ws_rpc::{
    // ---
    ClientConfig,
    ConnectionState,
    MemoryConnection,
    MemoryServer,
    ReconnectPolicy,
    RequestId,
    RpcClient,
};

/// Config tuned for fast tests: short grace, fast fixed reconnect.
pub fn fast_config() -> ClientConfig {
    // ---
    ClientConfig::new("memory://")
        .with_connect_grace(Duration::from_millis(200))
        .with_reconnect(ReconnectPolicy::fixed(Duration::from_millis(20)))
}

pub async fn accept(server: &mut MemoryServer) -> MemoryConnection {
    // ---
    timeout(Duration::from_secs(2), server.accept())
        .await
        .expect("timed out waiting for connection")
        .expect("memory server closed")
}

/// Read the next request frame, returning its id and the full frame.
pub async fn next_request(conn: &mut MemoryConnection) -> (RequestId, Value) {
    // ---
    let frame = timeout(Duration::from_secs(2), conn.recv_json())
        .await
        .expect("timed out waiting for request")
        .expect("connection closed or frame was not json");

    let id = frame["id"].as_u64().expect("request without numeric id");
    (RequestId::from(id), frame)
}

pub async fn wait_for_state(client: &RpcClient, wanted: ConnectionState) {
    // ---
    let mut state = client.subscribe_state();
    timeout(Duration::from_secs(2), state.wait_for(|s| *s == wanted))
        .await
        .unwrap_or_else(|_| panic!("client never reached {wanted:?}"))
        .expect("state channel closed");
}

pub fn init_logging() {
    imp::init();
}

mod imp {
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }
}
