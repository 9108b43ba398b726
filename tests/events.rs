// tests/events.rs

mod common;

use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::timeout;

use common::{accept, fast_config, init_logging, next_request};
use ws_rpc::{create_memory_transport, RpcClient};

#[tokio::test]
async fn test_event_listener_lifecycle() {
    // ---
    init_logging();

    let (transport, mut server) = create_memory_transport();
    let client = RpcClient::connect(fast_config(), transport).await.unwrap();
    let mut conn = accept(&mut server).await;

    // addEventListener
    let serve = tokio::spawn(async move {
        let (id, frame) = next_request(&mut conn).await;
        assert_eq!(frame["cmd"], "addEventListener");
        assert_eq!(frame["params"], json!(["OrderChanged", {"shop": 1}]));
        conn.respond(id, json!(7)).await.unwrap();
        conn
    });

    let mut sub = client
        .add_event_listener("OrderChanged", &json!({"shop": 1}))
        .await
        .unwrap();
    assert_eq!(sub.id(), 7);
    let conn = serve.await.unwrap();

    // Pushed events reach the subscription
    conn.push_event(7, json!({"order": 3})).await.unwrap();
    let received = timeout(Duration::from_secs(1), sub.inbox.recv())
        .await
        .expect("event not delivered");
    assert_eq!(received, Some(json!({"order": 3})));

    // emitEvent goes only to listeners whose info passes the filter
    let mut conn = conn;
    let serve = tokio::spawn(async move {
        let (id, frame) = next_request(&mut conn).await;
        assert_eq!(frame["cmd"], "getEventListeners");
        assert_eq!(frame["params"], json!(["OrderChanged"]));
        conn.respond(
            id,
            json!([
                {"id": 7, "info": {"shop": 1}},
                {"id": 8, "info": {"shop": 2}}
            ]),
        )
        .await
        .unwrap();

        let (id, frame) = next_request(&mut conn).await;
        assert_eq!(frame["cmd"], "emitEvent");
        assert_eq!(frame["params"], json!([[7], "hi"]));
        conn.respond(id, Value::Null).await.unwrap();
        conn
    });

    client
        .emit_event("OrderChanged", |info: &Value| info["shop"] == 1, "hi")
        .await
        .unwrap();
    let mut conn = serve.await.unwrap();

    // removeEventListener drops the local route
    let serve = tokio::spawn(async move {
        let (id, frame) = next_request(&mut conn).await;
        assert_eq!(frame["cmd"], "removeEventListener");
        assert_eq!(frame["params"], json!([7]));
        conn.send_text(format!(r#"{{"requestId": {id}, "event": "response"}}"#))
            .await
            .unwrap();
        conn
    });

    client.remove_event_listener(7).await.unwrap();
    let conn = serve.await.unwrap();

    conn.push_event(7, json!("ignored")).await.unwrap();
    let after = timeout(Duration::from_secs(1), sub.inbox.recv())
        .await
        .expect("subscription inbox did not close");
    assert_eq!(after, None);
}

#[tokio::test]
async fn test_close_ends_subscriptions() {
    // ---
    init_logging();

    let (transport, mut server) = create_memory_transport();
    let client = RpcClient::connect(fast_config(), transport).await.unwrap();
    let mut conn = accept(&mut server).await;

    let serve = tokio::spawn(async move {
        let (id, _) = next_request(&mut conn).await;
        conn.respond(id, json!(1)).await.unwrap();
        conn
    });

    let mut sub = client.add_event_listener("Tick", &()).await.unwrap();
    let _conn = serve.await.unwrap();

    client.close().await;

    let after = timeout(Duration::from_secs(1), sub.inbox.recv()).await.unwrap();
    assert_eq!(after, None);
}

#[tokio::test]
async fn test_event_right_behind_listener_reply_is_delivered() {
    // ---
    init_logging();

    let (transport, mut server) = create_memory_transport();
    let client = RpcClient::connect(fast_config(), transport).await.unwrap();
    let mut conn = accept(&mut server).await;

    // Reply and first event go out back to back
    let serve = tokio::spawn(async move {
        let (id, _) = next_request(&mut conn).await;
        conn.respond(id, json!(7)).await.unwrap();
        conn.push_event(7, json!("first")).await.unwrap();
        conn
    });

    let mut sub = client.add_event_listener("Tick", &()).await.unwrap();
    let _conn = serve.await.unwrap();

    let received = timeout(Duration::from_millis(500), sub.inbox.recv())
        .await
        .expect("first event lost");
    assert_eq!(received, Some(json!("first")));
}

#[tokio::test]
async fn test_listeners_are_registered_again_after_reconnect() {
    // ---
    init_logging();

    let (transport, mut server) = create_memory_transport();
    let client = RpcClient::connect(fast_config(), transport).await.unwrap();
    let mut first = accept(&mut server).await;

    let serve = tokio::spawn(async move {
        let (id, _) = next_request(&mut first).await;
        first.respond(id, json!(7)).await.unwrap();
        first
    });

    let mut sub = client
        .add_event_listener("OrderChanged", &json!({"shop": 1}))
        .await
        .unwrap();
    assert_eq!(sub.id(), 7);

    // Server drops the connection; its listener registry goes with it
    drop(serve.await.unwrap());

    let mut second = accept(&mut server).await;
    let (id, frame) = next_request(&mut second).await;
    assert_eq!(frame["cmd"], "addEventListener");
    assert_eq!(frame["params"], json!(["OrderChanged", {"shop": 1}]));

    second.respond(id, json!(9)).await.unwrap();
    second.push_event(7, json!("old id")).await.unwrap();
    second.push_event(9, json!("again")).await.unwrap();

    let received = timeout(Duration::from_secs(1), sub.inbox.recv())
        .await
        .expect("event after reconnect not delivered");
    assert_eq!(received, Some(json!("again")));
    assert_eq!(sub.id(), 9);
}
