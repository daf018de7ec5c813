//! Dual-transport update coordinator.
//!
//! Per tracked vehicle: bootstrap an initial snapshot over HTTPS, then
//! run the WebSocket subscription with graceful degradation to interval
//! polling. Both transports feed the same single-task reducer, so
//! consumers see identical semantics either way.
//!
//! Fan-out is a bounded channel with non-blocking sends: a slow consumer
//! drops updates, it never stalls the transport. Persistence failures
//! are logged and swallowed -- the live pipeline must not die because
//! the store did.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rivtel_api::websocket::{subscribe_vehicle_state, SubscriptionUpdate, WsClient, WsConfig};
use rivtel_api::{VehicleApi, VehicleSummary};

use crate::convert;
use crate::model::{Event, Reducer, VehicleState};
use crate::store::SnapshotStore;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Consumer fan-out channel capacity.
const UPDATE_CHANNEL_CAPACITY: usize = 10;

/// Coordinator configuration.
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    /// Explicit polling interval. When set, the subscription transport
    /// is skipped entirely; when `None`, WebSocket is attempted first
    /// and polling (at the default interval) is the fallback.
    pub poll_interval: Option<Duration>,
}

struct ActiveWatch {
    vehicle_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Coordinates live updates for the active vehicle.
///
/// Each vehicle gets its own reducer, subscription registration, and
/// update channel. Switching vehicles tears down the previous
/// transport before bootstrapping the next one.
pub struct Monitor {
    client: Arc<dyn VehicleApi>,
    store: Option<Arc<SnapshotStore>>,
    config: MonitorConfig,
    cancel: CancellationToken,
    active: Mutex<Option<ActiveWatch>>,
}

impl Monitor {
    pub fn new(
        client: Arc<dyn VehicleApi>,
        store: Option<Arc<SnapshotStore>>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            client,
            store,
            config,
            cancel: CancellationToken::new(),
            active: Mutex::new(None),
        }
    }

    /// Start watching a vehicle, replacing any previous watch.
    ///
    /// Returns the receive-only state stream; it closes on cancellation
    /// or when the watch is replaced.
    pub async fn watch(&self, vehicle: VehicleSummary) -> mpsc::Receiver<VehicleState> {
        self.stop_active().await;

        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let cancel = self.cancel.child_token();
        let task = tokio::spawn(run_vehicle(
            Arc::clone(&self.client),
            self.store.clone(),
            self.config.clone(),
            vehicle.clone(),
            tx,
            cancel.clone(),
        ));

        *self.active.lock().await = Some(ActiveWatch {
            vehicle_id: vehicle.id,
            cancel,
            task,
        });
        rx
    }

    /// Vehicle id of the current watch, if any.
    pub async fn active_vehicle(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|w| w.vehicle_id.clone())
    }

    /// Stop the current watch: cancels its token (stopping the ticker,
    /// closing the WebSocket, aborting in-flight HTTPS) and waits for
    /// the task to finish.
    pub async fn stop_active(&self) {
        if let Some(watch) = self.active.lock().await.take() {
            watch.cancel.cancel();
            let _ = watch.task.await;
        }
    }

    /// Cancel all work and wait for completion.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.stop_active().await;
    }
}

// ── Per-vehicle pipeline ─────────────────────────────────────────────

async fn run_vehicle(
    client: Arc<dyn VehicleApi>,
    store: Option<Arc<SnapshotStore>>,
    config: MonitorConfig,
    vehicle: VehicleSummary,
    tx: mpsc::Sender<VehicleState>,
    cancel: CancellationToken,
) {
    let vehicle_id = vehicle.id.clone();
    let mut reducer = Reducer::new();
    reducer.dispatch(Event::VehicleListReceived {
        vehicles: vec![vehicle],
        vehicle_id: vehicle_id.clone(),
    });

    // Bootstrap: one HTTPS snapshot; offline fallback to the store.
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = client.vehicle_state(&vehicle_id) => match result {
            Ok(record) => {
                let snapshot = convert::decode_state(&vehicle_id, &record);
                if let Some(state) = reducer.dispatch(Event::SnapshotReceived {
                    state: Box::new(snapshot),
                }) {
                    persist_and_emit(&store, &tx, &state);
                }
            }
            Err(e) => {
                warn!(vehicle_id = %vehicle_id, error = %e, "initial snapshot failed");
                if let Some(ref store) = store {
                    match store.latest(&vehicle_id) {
                        Ok(Some(cached)) => {
                            debug!(vehicle_id = %vehicle_id, "serving cached state (offline mode)");
                            let _ = tx.try_send(cached);
                        }
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "offline fallback read failed"),
                    }
                }
            }
        }
    }

    let poll_interval = config.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);

    // Subscription transport, unless an explicit interval was asked for.
    if config.poll_interval.is_none() {
        match run_subscription(&client, &store, &vehicle_id, &mut reducer, &tx, &cancel).await {
            TransportEnd::Cancelled => return,
            TransportEnd::Failed => {
                warn!(vehicle_id = %vehicle_id, "falling back to polling mode");
            }
        }
    }

    run_polling(&client, &store, &vehicle_id, &mut reducer, &tx, &cancel, poll_interval).await;
}

enum TransportEnd {
    Cancelled,
    Failed,
}

/// Live subscription leg: fresh session, connect, subscribe, pump
/// partial updates through the reducer until cancellation or failure.
async fn run_subscription(
    client: &Arc<dyn VehicleApi>,
    store: &Option<Arc<SnapshotStore>>,
    vehicle_id: &str,
    reducer: &mut Reducer,
    tx: &mpsc::Sender<VehicleState>,
    cancel: &CancellationToken,
) -> TransportEnd {
    // Stale csrf/a-sess values make the handshake fail, so mint fresh
    // ones first.
    if let Err(e) = client.create_session().await {
        warn!(error = %e, "session refresh for WebSocket failed");
        return TransportEnd::Failed;
    }

    let ws = match WsClient::connect(WsConfig::new(client.session_headers())).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "WebSocket connect failed");
            return TransportEnd::Failed;
        }
    };

    let mut subscription = match subscribe_vehicle_state(&ws, vehicle_id).await {
        Ok(sub) => sub,
        Err(e) => {
            warn!(error = %e, "vehicle-state subscription failed");
            ws.close().await;
            return TransportEnd::Failed;
        }
    };

    debug!(vehicle_id = %vehicle_id, "subscription established");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                ws.close().await;
                return TransportEnd::Cancelled;
            }
            _ = ws.wait_closed() => {
                // Terminal close before cancellation: degrade.
                return TransportEnd::Failed;
            }
            update = subscription.next() => match update {
                Some(SubscriptionUpdate::Data(payload)) => {
                    let fields = convert::decode_partial_update(&payload);
                    if fields.is_empty() {
                        continue;
                    }
                    if let Some(state) = reducer.dispatch(Event::PartialUpdate {
                        vehicle_id: vehicle_id.to_string(),
                        fields,
                    }) {
                        persist_and_emit(store, tx, &state);
                    }
                }
                Some(SubscriptionUpdate::Error(payload)) => {
                    warn!(vehicle_id = %vehicle_id, payload = %payload, "subscription error");
                    ws.close().await;
                    return TransportEnd::Failed;
                }
                None => {
                    ws.close().await;
                    return TransportEnd::Failed;
                }
            }
        }
    }
}

/// Polling leg: full snapshot on a fixed tick. Errors are logged and
/// polling continues.
async fn run_polling(
    client: &Arc<dyn VehicleApi>,
    store: &Option<Arc<SnapshotStore>>,
    vehicle_id: &str,
    reducer: &mut Reducer,
    tx: &mpsc::Sender<VehicleState>,
    cancel: &CancellationToken,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                match client.vehicle_state(vehicle_id).await {
                    Ok(record) => {
                        let snapshot = convert::decode_state(vehicle_id, &record);
                        if let Some(state) = reducer.dispatch(Event::SnapshotReceived {
                            state: Box::new(snapshot),
                        }) {
                            persist_and_emit(store, tx, &state);
                        }
                    }
                    Err(e) => {
                        warn!(vehicle_id = %vehicle_id, error = %e, "poll fetch failed");
                    }
                }
            }
        }
    }
}

/// Persist (best effort) and fan out without blocking on the consumer.
fn persist_and_emit(
    store: &Option<Arc<SnapshotStore>>,
    tx: &mpsc::Sender<VehicleState>,
    state: &VehicleState,
) {
    if let Some(store) = store {
        if let Err(e) = store.save(state) {
            warn!(error = %e, "failed to persist snapshot");
        }
    }
    // Drop on full: a slow consumer never pins the transport.
    let _ = tx.try_send(state.clone());
}
