//! GraphQL-over-WebSocket subscription client.
//!
//! Speaks the legacy `graphql-ws` subprotocol (NOT `graphql-transport-ws`):
//! `connection_init` / `connection_ack` handshake, `start` / `stop` per
//! subscription, server-side `ka` keepalives, `data` / `error` / `complete`
//! delivery, and `connection_terminate` on close.
//!
//! A single background task owns the socket. Subscribe/unsubscribe requests
//! reach it over a command channel, so the registry, the write half, and
//! reconnection state never need shared locking. Reconnects (up to 10
//! attempts, 5 s apart) reissue every live subscription with its original
//! query and variables; callback identity is preserved.
//!
//! The initial dial is NOT retried here: the gateway rejects handshakes
//! frequently ("bad handshake") and the coordinator decides whether to
//! degrade to polling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::SessionHeaders;
use crate::error::Error;

// ── Timing constants ─────────────────────────────────────────────────

const PING_INTERVAL: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MAX_RECONNECTS: u32 = 10;

/// Per-subscription update channel capacity. Sends are non-blocking;
/// updates are dropped when the consumer falls behind.
const UPDATE_CHANNEL_CAPACITY: usize = 10;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Frame types ──────────────────────────────────────────────────────

mod frame {
    pub const CONNECTION_INIT: &str = "connection_init";
    pub const CONNECTION_ACK: &str = "connection_ack";
    pub const CONNECTION_TERMINATE: &str = "connection_terminate";
    pub const KEEP_ALIVE: &str = "ka";
    pub const START: &str = "start";
    pub const STOP: &str = "stop";
    pub const DATA: &str = "data";
    pub const ERROR: &str = "error";
    pub const COMPLETE: &str = "complete";
}

/// A `graphql-ws` protocol frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl WsMessage {
    fn connection_init() -> Self {
        Self {
            id: None,
            kind: frame::CONNECTION_INIT.into(),
            payload: Some(serde_json::json!({
                "apollographql-client-name": crate::APOLLO_CLIENT_NAME,
            })),
        }
    }

    fn start(id: &str, query: &str, variables: &serde_json::Value) -> Self {
        Self {
            id: Some(id.to_string()),
            kind: frame::START.into(),
            payload: Some(serde_json::json!({
                "query": query,
                "variables": variables,
            })),
        }
    }

    fn stop(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            kind: frame::STOP.into(),
            payload: None,
        }
    }

    fn terminate() -> Self {
        Self {
            id: None,
            kind: frame::CONNECTION_TERMINATE.into(),
            payload: None,
        }
    }
}

// ── Public types ─────────────────────────────────────────────────────

/// Connection parameters for the WebSocket dial.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: Url,
    pub headers: SessionHeaders,
}

impl WsConfig {
    /// Config against the production gateway with the given session.
    pub fn new(headers: SessionHeaders) -> Self {
        Self {
            url: crate::WEBSOCKET_URL.parse().expect("static URL is valid"),
            headers,
        }
    }
}

/// One update delivered to a subscription callback.
#[derive(Debug, Clone)]
pub enum SubscriptionUpdate {
    /// A `data` frame's payload.
    Data(serde_json::Value),
    /// An `error` frame's payload. Terminal for the subscription's data
    /// flow, but the registry entry remains until unsubscribed.
    Error(serde_json::Value),
}

/// Callback invoked for each update on a subscription.
pub type SubscriptionCallback = Arc<dyn Fn(SubscriptionUpdate) + Send + Sync>;

struct SubEntry {
    query: String,
    variables: serde_json::Value,
    callback: SubscriptionCallback,
}

enum Command {
    Subscribe {
        id: String,
        query: String,
        variables: serde_json::Value,
        callback: SubscriptionCallback,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Unsubscribe {
        id: String,
        reply: oneshot::Sender<Result<(), Error>>,
    },
}

// ── Client handle ────────────────────────────────────────────────────

/// Handle to a connected WebSocket session.
pub struct WsClient {
    cmd_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl WsClient {
    /// Dial the gateway and perform the `connection_init` handshake.
    ///
    /// A dial or handshake failure is returned immediately without retry;
    /// reconnection only applies to an established session.
    pub async fn connect(config: WsConfig) -> Result<Self, Error> {
        let mut stream = dial(&config).await?;

        send_with_deadline(&mut stream, &WsMessage::connection_init()).await?;

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            run_loop(stream, config, cmd_rx, task_cancel).await;
        });

        Ok(Self {
            cmd_tx,
            cancel,
            task: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        })
    }

    /// Register a subscription and emit its `start` frame.
    ///
    /// The (query, variables, callback) triple is retained so a reconnect
    /// can reissue it. A duplicate `id` is an error.
    pub async fn subscribe(
        &self,
        id: &str,
        query: &str,
        variables: serde_json::Value,
        callback: SubscriptionCallback,
    ) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Subscribe {
                id: id.to_string(),
                query: query.to_string(),
                variables,
                callback,
                reply,
            })
            .await
            .map_err(|_| Error::WebSocketClosed)?;
        rx.await.map_err(|_| Error::WebSocketClosed)?
    }

    /// Emit a `stop` frame and drop the registry entry.
    pub async fn unsubscribe(&self, id: &str) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Unsubscribe {
                id: id.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::WebSocketClosed)?;
        rx.await.map_err(|_| Error::WebSocketClosed)?
    }

    /// `true` once the session is closed (explicitly or after the
    /// reconnect budget ran out).
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the session reaches terminal close.
    pub async fn wait_closed(&self) {
        self.cancel.cancelled().await;
    }

    /// Close the session. Idempotent.
    ///
    /// Emits `connection_terminate` best-effort, closes the socket, and
    /// waits for the background task to exit -- no callback is invoked
    /// after this returns.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.cancel.cancel();
        }
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Owns the socket: routes commands, dispatches frames, pings, reconnects.
async fn run_loop(
    mut stream: WsStream,
    config: WsConfig,
    mut cmd_rx: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) {
    let mut registry: HashMap<String, SubEntry> = HashMap::new();
    // Starts are buffered until the server acks the connection.
    let mut acked = false;
    let mut pending_starts: Vec<String> = Vec::new();

    'session: loop {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await; // consume the immediate first tick

        let reconnect_reason: &str;

        'connection: loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    let _ = send_with_deadline(&mut stream, &WsMessage::terminate()).await;
                    let _ = stream.close(None).await;
                    return;
                }

                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        // All handles dropped: tear down like close().
                        cancel.cancel();
                        let _ = send_with_deadline(&mut stream, &WsMessage::terminate()).await;
                        let _ = stream.close(None).await;
                        return;
                    };
                    match cmd {
                        Command::Subscribe { id, query, variables, callback, reply } => {
                            if registry.contains_key(&id) {
                                let _ = reply.send(Err(Error::DuplicateSubscription { id }));
                                continue 'connection;
                            }
                            let start = WsMessage::start(&id, &query, &variables);
                            registry.insert(id.clone(), SubEntry { query, variables, callback });
                            if acked {
                                if let Err(e) = send_with_deadline(&mut stream, &start).await {
                                    tracing::warn!(error = %e, "start frame write failed");
                                    let _ = reply.send(Ok(()));
                                    reconnect_reason = "write failure";
                                    break 'connection;
                                }
                            } else {
                                pending_starts.push(id);
                            }
                            let _ = reply.send(Ok(()));
                        }
                        Command::Unsubscribe { id, reply } => {
                            registry.remove(&id);
                            pending_starts.retain(|p| p != &id);
                            // Best effort: a dead connection is caught by
                            // the next ping or read.
                            let _ = send_with_deadline(&mut stream, &WsMessage::stop(&id)).await;
                            let _ = reply.send(Ok(()));
                        }
                    }
                }

                _ = ping.tick() => {
                    let deadline = tokio::time::timeout(
                        WRITE_TIMEOUT,
                        stream.send(Message::Ping(Vec::new())),
                    );
                    match deadline.await {
                        Ok(Ok(())) => {}
                        _ => {
                            tracing::warn!("WebSocket ping failed");
                            reconnect_reason = "ping failure";
                            break 'connection;
                        }
                    }
                }

                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            handle_frame(&text, &mut registry, &mut acked, &mut pending_starts, &mut stream).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = stream.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(close))) => {
                            tracing::info!(?close, "WebSocket close frame received");
                            reconnect_reason = "server close";
                            break 'connection;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "WebSocket read error");
                            reconnect_reason = "read error";
                            break 'connection;
                        }
                        None => {
                            tracing::info!("WebSocket stream ended");
                            reconnect_reason = "stream end";
                            break 'connection;
                        }
                        _ => {} // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }

        tracing::info!(reason = reconnect_reason, "WebSocket disconnected, reconnecting");

        match reconnect(&config, &cancel).await {
            Some(new_stream) => {
                stream = new_stream;
                // Reissue every live subscription once the new
                // connection is acked.
                acked = false;
                pending_starts = registry.keys().cloned().collect();
                continue 'session;
            }
            None => {
                // Reconnect budget exhausted (or cancelled): terminal.
                cancel.cancel();
                return;
            }
        }
    }
}

/// Parse and dispatch one text frame.
async fn handle_frame(
    text: &str,
    registry: &mut HashMap<String, SubEntry>,
    acked: &mut bool,
    pending_starts: &mut Vec<String>,
    stream: &mut WsStream,
) {
    let msg: WsMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable WebSocket frame");
            return;
        }
    };

    match msg.kind.as_str() {
        frame::CONNECTION_ACK => {
            *acked = true;
            for id in pending_starts.drain(..) {
                if let Some(entry) = registry.get(&id) {
                    let start = WsMessage::start(&id, &entry.query, &entry.variables);
                    if let Err(e) = send_with_deadline(stream, &start).await {
                        tracing::warn!(id = %id, error = %e, "buffered start write failed");
                    }
                }
            }
        }
        frame::KEEP_ALIVE => {}
        frame::DATA => {
            if let (Some(id), Some(payload)) = (msg.id, msg.payload) {
                if let Some(entry) = registry.get(&id) {
                    (entry.callback)(SubscriptionUpdate::Data(payload));
                }
            }
        }
        frame::ERROR => {
            if let Some(id) = msg.id {
                // Terminal for the data flow; the entry remains so the
                // caller can still unsubscribe.
                if let Some(entry) = registry.get(&id) {
                    let payload = msg.payload.unwrap_or(serde_json::Value::Null);
                    (entry.callback)(SubscriptionUpdate::Error(payload));
                }
            }
        }
        frame::COMPLETE => {
            if let Some(id) = msg.id {
                registry.remove(&id);
            }
        }
        other => {
            tracing::debug!(kind = other, "unhandled WebSocket frame type");
        }
    }
}

/// Dial the gateway with session headers and the `graphql-ws` subprotocol.
async fn dial(config: &WsConfig) -> Result<WsStream, Error> {
    let uri: tungstenite::http::Uri = config
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri)
        .with_sub_protocol("graphql-ws")
        .with_header("apollographql-client-name", crate::APOLLO_CLIENT_NAME)
        .with_header("User-Agent", crate::USER_AGENT);

    if let Some(ref app) = config.headers.app_session_token {
        request = request.with_header("a-sess", app.as_str());
    }
    if let Some(ref csrf) = config.headers.csrf_token {
        request = request.with_header("csrf-token", csrf.as_str());
    }
    if let Some(ref user) = config.headers.user_session_token {
        request = request.with_header("u-sess", user.as_str());
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    Ok(stream)
}

/// Re-dial after a drop: up to [`MAX_RECONNECTS`] attempts at
/// [`RECONNECT_DELAY`] spacing. Returns `None` once the budget is
/// exhausted or the session was cancelled.
async fn reconnect(config: &WsConfig, cancel: &CancellationToken) -> Option<WsStream> {
    for attempt in 1..=MAX_RECONNECTS {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }

        match dial(config).await {
            Ok(mut stream) => {
                if send_with_deadline(&mut stream, &WsMessage::connection_init())
                    .await
                    .is_ok()
                {
                    tracing::info!(attempt, "WebSocket reconnected");
                    return Some(stream);
                }
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "WebSocket reconnect attempt failed");
            }
        }
    }

    tracing::error!(max = MAX_RECONNECTS, "WebSocket reconnect limit reached");
    None
}

/// Serialize and send one frame under the write deadline.
async fn send_with_deadline(stream: &mut WsStream, msg: &WsMessage) -> Result<(), Error> {
    let text = serde_json::to_string(msg)?;
    match tokio::time::timeout(WRITE_TIMEOUT, stream.send(Message::Text(text))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Error::WebSocketConnect(e.to_string())),
        Err(_) => Err(Error::WebSocketConnect("write deadline exceeded".into())),
    }
}

// ── Vehicle-state subscription ───────────────────────────────────────

const VEHICLE_STATE_SUBSCRIPTION: &str = r#"
    subscription VehicleStateUpdates($vehicleId: String!) {
        vehicleState(id: $vehicleId) {
            __typename
            batteryLevel { value timeStamp }
            chargeState { value timeStamp }
            rangeEstimate { value timeStamp }
            isLocked { value timeStamp }
            cabinTemp { value timeStamp }
        }
    }
"#;

/// A live `VehicleStateUpdates` subscription.
///
/// Updates arrive on a bounded channel (capacity 10); the socket task
/// never blocks on a slow consumer -- overflow is dropped.
pub struct VehicleStateSubscription {
    id: String,
    updates: mpsc::Receiver<SubscriptionUpdate>,
}

impl VehicleStateSubscription {
    /// Receive the next update. `None` once the channel closes.
    pub async fn next(&mut self) -> Option<SubscriptionUpdate> {
        self.updates.recv().await
    }

    /// Stop the subscription on the given session.
    pub async fn unsubscribe(self, client: &WsClient) -> Result<(), Error> {
        client.unsubscribe(&self.id).await
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Subscribe to state updates for one vehicle.
pub async fn subscribe_vehicle_state(
    client: &WsClient,
    vehicle_id: &str,
) -> Result<VehicleStateSubscription, Error> {
    let id = format!("vehicle-state-{vehicle_id}");
    let (tx, updates) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

    let callback: SubscriptionCallback = Arc::new(move |update| {
        // Non-blocking: drop on full channel.
        let _ = tx.try_send(update);
    });

    client
        .subscribe(
            &id,
            VEHICLE_STATE_SUBSCRIPTION,
            serde_json::json!({ "vehicleId": vehicle_id }),
            callback,
        )
        .await?;

    Ok(VehicleStateSubscription { id, updates })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_frame_carries_query_and_variables() {
        let msg = WsMessage::start(
            "vehicle-state-v1",
            "subscription { x }",
            &serde_json::json!({ "vehicleId": "v1" }),
        );
        let text = serde_json::to_string(&msg).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed["type"], "start");
        assert_eq!(parsed["id"], "vehicle-state-v1");
        assert_eq!(parsed["payload"]["query"], "subscription { x }");
        assert_eq!(parsed["payload"]["variables"]["vehicleId"], "v1");
    }

    #[test]
    fn connection_init_carries_client_name() {
        let msg = WsMessage::connection_init();
        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();

        assert_eq!(parsed["type"], "connection_init");
        assert_eq!(
            parsed["payload"]["apollographql-client-name"],
            crate::APOLLO_CLIENT_NAME
        );
        assert!(parsed.get("id").is_none());
    }

    #[test]
    fn control_frames_omit_absent_fields() {
        let stop = serde_json::to_value(WsMessage::stop("s1")).unwrap();
        assert_eq!(stop["type"], "stop");
        assert_eq!(stop["id"], "s1");
        assert!(stop.get("payload").is_none());

        let term = serde_json::to_value(WsMessage::terminate()).unwrap();
        assert_eq!(term["type"], "connection_terminate");
        assert!(term.get("id").is_none());
    }

    #[test]
    fn server_frames_deserialize() {
        let data: WsMessage = serde_json::from_str(
            r#"{"id":"sub1","type":"data","payload":{"data":{"vehicleState":{}}}}"#,
        )
        .unwrap();
        assert_eq!(data.kind, "data");
        assert_eq!(data.id.as_deref(), Some("sub1"));
        assert!(data.payload.is_some());

        let ka: WsMessage = serde_json::from_str(r#"{"type":"ka"}"#).unwrap();
        assert_eq!(ka.kind, "ka");
        assert!(ka.id.is_none());
    }
}
