use crate::config::SessionConfig;
use crate::session::session::{SessionActor, SessionDeps};
use crate::session::session_command::SessionCommand;
use crate::session::view::{SessionEvent, SessionView};
use meshroom_core::{PeerId, SignalMessage};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::debug;

/// Handle to a running session. Cheap to clone; every call is a message to
/// the session task. Once the session has disconnected, calls return
/// immediately (`false` for the screen-share toggles).
#[derive(Clone)]
pub struct MeshSession {
    local_id: PeerId,
    command_tx: mpsc::Sender<SessionCommand>,
    view_rx: watch::Receiver<SessionView>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl MeshSession {
    /// Starts the session task. Local capture is requested immediately.
    pub fn spawn(config: SessionConfig, deps: SessionDeps) -> Self {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (view_tx, view_rx) = watch::channel(SessionView::default());
        let (events_tx, _) = broadcast::channel(64);
        let local_id = config.local_id;

        let actor = SessionActor::new(config, deps, command_rx, view_tx, events_tx.clone());
        tokio::spawn(actor.run());

        Self {
            local_id,
            command_tx,
            view_rx,
            events_tx,
        }
    }

    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    pub async fn connect_to_peer(&self, peer: PeerId) {
        self.send(SessionCommand::ConnectToPeer { peer, force: false })
            .await;
    }

    /// Offers to `peer` after discarding any link it has.
    pub async fn connect_to_peer_force_offer(&self, peer: PeerId) {
        self.send(SessionCommand::ConnectToPeer { peer, force: true })
            .await;
    }

    pub async fn update_roster(&self, peers: Vec<PeerId>) {
        self.send(SessionCommand::UpdateRoster { peers }).await;
    }

    pub async fn deliver_signal(&self, message: SignalMessage) {
        self.send(SessionCommand::DeliverSignal(message)).await;
    }

    pub async fn transport_changed(&self, connected: bool) {
        self.send(SessionCommand::TransportChanged { connected })
            .await;
    }

    pub async fn start_screen_share(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::StartScreenShare { reply }).await;
        rx.await.unwrap_or(false)
    }

    pub async fn stop_screen_share(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::StopScreenShare { reply }).await;
        rx.await.unwrap_or(false)
    }

    /// Closes every link, stops capture and deactivates signaling. Safe to
    /// call more than once.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Disconnect { reply }).await;
        let _ = rx.await;
    }

    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    /// The latest published view.
    pub fn snapshot(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    async fn send(&self, cmd: SessionCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            debug!("Session {} is closed; command dropped", self.local_id);
        }
    }
}
