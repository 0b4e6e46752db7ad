use crate::config::SignalingConfig;
use crate::error::MeshError;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use meshroom_core::{ClientFrame, Destination, PeerId, ServerFrame, SubscriptionId};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tracing::{debug, info, warn};

/// Doubles `current`, capped at `max`.
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

struct Subscription {
    destination: String,
    sink: mpsc::UnboundedSender<Value>,
}

struct Inner {
    member_id: PeerId,
    config: SignalingConfig,
    subscriptions: DashMap<SubscriptionId, Subscription>,
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientFrame>>>,
    connected_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Persistent connection to the relay. Reconnects with exponential backoff
/// and re-issues every live subscription after each reconnect.
#[derive(Clone)]
pub struct SignalingClient {
    inner: Arc<Inner>,
}

impl SignalingClient {
    /// Starts connecting in the background. Fails only if the relay URL
    /// cannot form a valid request.
    pub async fn connect(member_id: PeerId, config: SignalingConfig) -> Result<Self, MeshError> {
        build_request(member_id, &config)?;

        let (connected_tx, _) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            member_id,
            config,
            subscriptions: DashMap::new(),
            outbound: Mutex::new(None),
            connected_tx,
            shutdown_tx,
            task: Mutex::new(None),
        });

        let handle = tokio::spawn(inner.clone().run(shutdown_rx));
        *inner.task.lock().await = Some(handle);

        Ok(Self { inner })
    }

    pub fn member_id(&self) -> PeerId {
        self.inner.member_id
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connected_tx.borrow()
    }

    /// Connection state; `true` only once all subscriptions are re-issued.
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.inner.connected_tx.subscribe()
    }

    /// Waits until the client is connected or `timeout` elapses.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut rx = self.connected();
        tokio::time::timeout(timeout, rx.wait_for(|connected| *connected))
            .await
            .is_ok_and(|r| r.is_ok())
    }

    /// Registers a subscription that survives reconnects. Message bodies
    /// arrive on the returned receiver.
    pub async fn subscribe(
        &self,
        destination: &Destination,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<Value>) {
        let id = SubscriptionId::new();
        let (sink, rx) = mpsc::unbounded_channel();
        let destination = destination.to_string();

        self.inner.subscriptions.insert(
            id,
            Subscription {
                destination: destination.clone(),
                sink,
            },
        );
        self.inner
            .send_frame(ClientFrame::Subscribe { id, destination })
            .await;

        (id, rx)
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) {
        if self.inner.subscriptions.remove(&id).is_some() {
            self.inner.send_frame(ClientFrame::Unsubscribe { id }).await;
        }
    }

    /// Sends `body` to `destination`. Returns `false` if not connected.
    pub async fn publish(&self, destination: &Destination, body: Value) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.inner
            .send_frame(ClientFrame::Send {
                destination: destination.to_string(),
                body,
            })
            .await
    }

    /// Closes the connection and stops reconnecting. Idempotent.
    pub async fn deactivate(&self) {
        if self.inner.shutdown_tx.send_replace(true) {
            return;
        }
        info!("Deactivating signaling for member {}", self.inner.member_id);

        if let Some(handle) = self.inner.task.lock().await.take() {
            let _ = handle.await;
        }
        self.inner.connected_tx.send_replace(false);
    }
}

impl Inner {
    async fn send_frame(&self, frame: ClientFrame) -> bool {
        match self.outbound.lock().await.as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut delay = self.config.reconnect_delay;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.connect_once(&mut shutdown_rx).await {
                Ok(()) => delay = self.config.reconnect_delay,
                Err(e) => warn!("Relay connection for member {} failed: {}", self.member_id, e),
            }
            self.connected_tx.send_replace(false);

            if *shutdown_rx.borrow() {
                break;
            }

            info!("Reconnecting to relay in {:?}", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.changed() => break,
            }
            delay = next_backoff(delay, self.config.max_reconnect_delay);
        }

        debug!("Signaling task for member {} finished", self.member_id);
    }

    /// One connection lifetime. `Ok` once the socket was established,
    /// however it ended, or when shutdown interrupts the handshake.
    async fn connect_once(&self, shutdown_rx: &mut watch::Receiver<bool>) -> Result<(), MeshError> {
        let request = build_request(self.member_id, &self.config)?;
        let (ws_stream, _) = tokio::select! {
            result = connect_async(request) => result?,
            _ = shutdown_rx.changed() => {
                debug!("Handshake for member {} abandoned on shutdown", self.member_id);
                return Ok(());
            }
        };
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientFrame>();
        {
            // Held across the replay so a concurrent subscribe is either
            // replayed here or sent after; the relay ignores duplicates.
            let mut outbound = self.outbound.lock().await;
            for entry in self.subscriptions.iter() {
                let _ = out_tx.send(ClientFrame::Subscribe {
                    id: *entry.key(),
                    destination: entry.destination.clone(),
                });
            }
            *outbound = Some(out_tx);
        }
        self.connected_tx.send_replace(true);
        info!("Member {} connected to relay", self.member_id);

        let heartbeat = self.config.heartbeat_interval;
        let silence_limit = heartbeat * 2;
        let mut ticker = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                frame = out_rx.recv() => {
                    let Some(frame) = frame else { break };
                    let text = match frame.to_text() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Could not encode frame: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_write.send(Message::text(text)).await {
                        warn!("Relay write failed: {}", e);
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if last_seen.elapsed() > silence_limit {
                        warn!("Relay silent for {:?}, dropping connection", silence_limit);
                        break;
                    }
                    let Ok(text) = ClientFrame::Heartbeat.to_text() else { continue };
                    if ws_write.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }

                msg = ws_read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            last_seen = Instant::now();
                            self.dispatch(&text);
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Relay closed the connection");
                            break;
                        }
                        Some(Ok(_)) => last_seen = Instant::now(),
                        Some(Err(e)) => {
                            warn!("Relay read failed: {}", e);
                            break;
                        }
                    }
                }

                _ = shutdown_rx.changed() => {
                    let _ = ws_write.send(Message::Close(None)).await;
                    break;
                }
            }
        }

        *self.outbound.lock().await = None;
        Ok(())
    }

    fn dispatch(&self, text: &str) {
        let frame = match serde_json::from_str::<ServerFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Unreadable relay frame: {}", e);
                return;
            }
        };

        match frame {
            ServerFrame::Message {
                subscription, body, ..
            } => {
                let delivered = self
                    .subscriptions
                    .get(&subscription)
                    .map(|sub| sub.sink.send(body).is_ok());
                if delivered == Some(false) {
                    self.subscriptions.remove(&subscription);
                }
            }
            ServerFrame::Connected {
                member_id,
                heartbeat_ms,
            } => debug!(
                "Relay acknowledged member {} (heartbeat {} ms)",
                member_id, heartbeat_ms
            ),
            ServerFrame::Heartbeat => {}
            ServerFrame::Error { message } => warn!("Relay rejected a frame: {}", message),
        }
    }
}

fn build_request(member_id: PeerId, config: &SignalingConfig) -> Result<Request, MeshError> {
    let url = format!("{}/ws/{}", config.url.trim_end_matches('/'), member_id);
    let mut request = url.into_client_request()?;

    if let Some(token) = &config.auth_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| MeshError::Config(format!("auth token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    Ok(request)
}
