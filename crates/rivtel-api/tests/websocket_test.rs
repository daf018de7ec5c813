#![allow(clippy::unwrap_used)]
// Integration tests for `WsClient` against an in-process graphql-ws
// mock server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use url::Url;

use rivtel_api::client::SessionHeaders;
use rivtel_api::websocket::{SubscriptionCallback, SubscriptionUpdate, WsClient, WsConfig};

type ServerWs = WebSocketStream<TcpStream>;

// ── Mock server plumbing ────────────────────────────────────────────

/// Bind a listener and return (config, handle to the accepted session).
///
/// The provided closure drives the server side of one connection.
async fn spawn_server<F, Fut>(behavior: F) -> WsConfig
where
    F: FnOnce(ServerWs) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &tokio_tungstenite::tungstenite::handshake::server::Request, mut response: tokio_tungstenite::tungstenite::handshake::server::Response| {
            if let Some(protocol) = req.headers().get("Sec-WebSocket-Protocol") {
                response.headers_mut().insert("Sec-WebSocket-Protocol", protocol.clone());
            }
            Ok(response)
        })
        .await
        .unwrap();
        behavior(ws).await;
    });

    WsConfig {
        url: Url::parse(&format!("ws://{addr}")).unwrap(),
        headers: SessionHeaders::default(),
    }
}

/// Read frames until a text frame of the given type arrives.
async fn expect_frame(ws: &mut ServerWs, kind: &str) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("server read timed out")
            .expect("stream ended")
            .expect("read error");
        if let Message::Text(text) = msg {
            let frame: Value = serde_json::from_str(&text).unwrap();
            if frame["type"] == kind {
                return frame;
            }
        }
    }
}

async fn send_frame(ws: &mut ServerWs, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

fn collector() -> (SubscriptionCallback, mpsc::UnboundedReceiver<SubscriptionUpdate>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: SubscriptionCallback = Arc::new(move |update| {
        let _ = tx.send(update);
    });
    (callback, rx)
}

async fn recv_update(
    rx: &mut mpsc::UnboundedReceiver<SubscriptionUpdate>,
) -> SubscriptionUpdate {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no update arrived")
        .expect("callback channel closed")
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn subscribe_receives_data_frames() {
    let config = spawn_server(|mut ws| async move {
        expect_frame(&mut ws, "connection_init").await;
        send_frame(&mut ws, json!({ "type": "connection_ack" })).await;

        let start = expect_frame(&mut ws, "start").await;
        assert_eq!(start["id"], "sub1");
        assert!(start["payload"]["query"]
            .as_str()
            .unwrap()
            .contains("subscription"));

        send_frame(
            &mut ws,
            json!({
                "id": "sub1",
                "type": "data",
                "payload": { "data": { "vehicleState": { "batteryLevel": { "value": 55.0 } } } }
            }),
        )
        .await;

        // Hold the connection open until the client goes away.
        while ws.next().await.is_some() {}
    })
    .await;

    let client = WsClient::connect(config).await.unwrap();
    let (callback, mut rx) = collector();
    client
        .subscribe("sub1", "subscription { x }", json!({}), callback)
        .await
        .unwrap();

    match recv_update(&mut rx).await {
        SubscriptionUpdate::Data(payload) => {
            assert_eq!(
                payload["data"]["vehicleState"]["batteryLevel"]["value"],
                55.0
            );
        }
        other => panic!("expected Data, got {other:?}"),
    }

    client.close().await;
}

#[tokio::test]
async fn starts_are_buffered_until_ack() {
    let config = spawn_server(|mut ws| async move {
        expect_frame(&mut ws, "connection_init").await;

        // Delay the ack; the start frame must not arrive before it.
        tokio::time::sleep(Duration::from_millis(200)).await;
        send_frame(&mut ws, json!({ "type": "connection_ack" })).await;

        let start = expect_frame(&mut ws, "start").await;
        send_frame(
            &mut ws,
            json!({ "id": start["id"], "type": "data", "payload": { "ok": true } }),
        )
        .await;

        while ws.next().await.is_some() {}
    })
    .await;

    let client = WsClient::connect(config).await.unwrap();
    let (callback, mut rx) = collector();
    // Subscribe immediately; the server has not acked yet.
    client
        .subscribe("sub1", "subscription { x }", json!({}), callback)
        .await
        .unwrap();

    match recv_update(&mut rx).await {
        SubscriptionUpdate::Data(payload) => assert_eq!(payload["ok"], true),
        other => panic!("expected Data, got {other:?}"),
    }

    client.close().await;
}

#[tokio::test]
async fn duplicate_subscription_id_is_an_error() {
    let config = spawn_server(|mut ws| async move {
        expect_frame(&mut ws, "connection_init").await;
        send_frame(&mut ws, json!({ "type": "connection_ack" })).await;
        while ws.next().await.is_some() {}
    })
    .await;

    let client = WsClient::connect(config).await.unwrap();
    let (callback, _rx) = collector();
    client
        .subscribe("dup", "subscription { x }", json!({}), callback.clone())
        .await
        .unwrap();

    let second = client
        .subscribe("dup", "subscription { x }", json!({}), callback)
        .await;
    assert!(matches!(
        second,
        Err(rivtel_api::Error::DuplicateSubscription { .. })
    ));

    client.close().await;
}

#[tokio::test]
async fn error_frames_reach_the_callback() {
    let config = spawn_server(|mut ws| async move {
        expect_frame(&mut ws, "connection_init").await;
        send_frame(&mut ws, json!({ "type": "connection_ack" })).await;

        expect_frame(&mut ws, "start").await;
        send_frame(
            &mut ws,
            json!({
                "id": "sub1",
                "type": "error",
                "payload": { "message": "subscription rejected" }
            }),
        )
        .await;

        // The registry entry must survive the error: an unsubscribe
        // still produces a stop frame.
        expect_frame(&mut ws, "stop").await;
        while ws.next().await.is_some() {}
    })
    .await;

    let client = WsClient::connect(config).await.unwrap();
    let (callback, mut rx) = collector();
    client
        .subscribe("sub1", "subscription { x }", json!({}), callback)
        .await
        .unwrap();

    match recv_update(&mut rx).await {
        SubscriptionUpdate::Error(payload) => {
            assert_eq!(payload["message"], "subscription rejected");
        }
        other => panic!("expected Error, got {other:?}"),
    }

    client.unsubscribe("sub1").await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn complete_removes_the_subscription() {
    let config = spawn_server(|mut ws| async move {
        expect_frame(&mut ws, "connection_init").await;
        send_frame(&mut ws, json!({ "type": "connection_ack" })).await;

        expect_frame(&mut ws, "start").await;
        send_frame(&mut ws, json!({ "id": "sub1", "type": "complete" })).await;
        // Data after complete must not be dispatched.
        send_frame(
            &mut ws,
            json!({ "id": "sub1", "type": "data", "payload": { "late": true } }),
        )
        .await;

        while ws.next().await.is_some() {}
    })
    .await;

    let client = WsClient::connect(config).await.unwrap();
    let (callback, mut rx) = collector();
    client
        .subscribe("sub1", "subscription { x }", json!({}), callback)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err(), "no update should have arrived");

    client.close().await;
}

#[tokio::test]
async fn keepalive_frames_are_accepted_silently() {
    let config = spawn_server(|mut ws| async move {
        expect_frame(&mut ws, "connection_init").await;
        send_frame(&mut ws, json!({ "type": "connection_ack" })).await;
        send_frame(&mut ws, json!({ "type": "ka" })).await;
        send_frame(&mut ws, json!({ "type": "ka" })).await;

        expect_frame(&mut ws, "start").await;
        send_frame(
            &mut ws,
            json!({ "id": "sub1", "type": "data", "payload": { "after_ka": true } }),
        )
        .await;
        while ws.next().await.is_some() {}
    })
    .await;

    let client = WsClient::connect(config).await.unwrap();
    let (callback, mut rx) = collector();
    client
        .subscribe("sub1", "subscription { x }", json!({}), callback)
        .await
        .unwrap();

    match recv_update(&mut rx).await {
        SubscriptionUpdate::Data(payload) => assert_eq!(payload["after_ka"], true),
        other => panic!("expected Data, got {other:?}"),
    }

    client.close().await;
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let config = spawn_server(|mut ws| async move {
        expect_frame(&mut ws, "connection_init").await;
        send_frame(&mut ws, json!({ "type": "connection_ack" })).await;
        expect_frame(&mut ws, "start").await;
        send_frame(
            &mut ws,
            json!({ "id": "sub1", "type": "data", "payload": { "n": 1 } }),
        )
        .await;
        while ws.next().await.is_some() {}
    })
    .await;

    let client = WsClient::connect(config).await.unwrap();
    let (callback, mut rx) = collector();
    client
        .subscribe("sub1", "subscription { x }", json!({}), callback)
        .await
        .unwrap();
    recv_update(&mut rx).await;

    // Closing twice returns cleanly both times.
    client.close().await;
    client.close().await;
    assert!(client.is_closed());

    // No callback fires after close has returned.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());

    // Further subscribes fail closed.
    let (callback, _rx) = collector();
    let result = client
        .subscribe("sub2", "subscription { x }", json!({}), callback)
        .await;
    assert!(matches!(result, Err(rivtel_api::Error::WebSocketClosed)));
}

#[tokio::test]
async fn dial_failure_surfaces_without_retry() {
    // Nothing is listening here.
    let config = WsConfig {
        url: Url::parse("ws://127.0.0.1:1").unwrap(),
        headers: SessionHeaders::default(),
    };

    let started = std::time::Instant::now();
    let result = WsClient::connect(config).await;
    assert!(matches!(
        result,
        Err(rivtel_api::Error::WebSocketConnect(_))
    ));
    // No in-component retry loop: failure is immediate.
    assert!(started.elapsed() < Duration::from_secs(4));
}
