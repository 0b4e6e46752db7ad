use crate::config::SessionConfig;
use crate::error::MediaError;
use crate::media::{
    DisplayStream, LocalMediaSource, LocalStream, LocalTrack, MediaDevices, RemoteMediaStream,
    RemoteTrack,
};
use crate::session::link_table::{CandidateQueues, PeerLinkTable};
use crate::session::reconciler::Reconciler;
use crate::session::session_command::SessionCommand;
use crate::session::step::Continuation;
use crate::session::view::{LinkStatus, SessionEvent, SessionView};
use crate::signaling::{RosterFeed, SignalingOutput};
use crate::transport::{LinkEvent, MediaState, PeerConnection, PeerConnectionFactory};
use futures::future::join_all;
use meshroom_core::{ConnectionId, PeerId, SignalMessage};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Collaborators a session talks to.
pub struct SessionDeps {
    pub signaling: Arc<dyn SignalingOutput>,
    pub roster: Arc<dyn RosterFeed>,
    pub connections: Arc<dyn PeerConnectionFactory>,
    pub devices: Arc<dyn MediaDevices>,
    /// Whether the signaling transport is already up when the session starts.
    pub transport_connected: bool,
}

/// Owns all per-room negotiation state. Runs on a single task; everything
/// that awaits on a connection runs elsewhere and comes back as a
/// [`Continuation`].
pub(crate) struct SessionActor {
    pub(super) config: SessionConfig,
    pub(super) links: PeerLinkTable,
    pub(super) candidates: CandidateQueues,
    pub(super) reconciler: Reconciler,
    pub(super) media: LocalMediaSource,
    pub(super) remote_streams: Arc<BTreeMap<PeerId, RemoteMediaStream>>,
    pub(super) transport_connected: bool,
    pub(super) signaling: Arc<dyn SignalingOutput>,
    roster_feed: Arc<dyn RosterFeed>,
    pub(super) factory: Arc<dyn PeerConnectionFactory>,
    command_rx: mpsc::Receiver<SessionCommand>,
    pub(super) link_tx: mpsc::Sender<LinkEvent>,
    link_rx: mpsc::Receiver<LinkEvent>,
    pub(super) continuation_tx: mpsc::Sender<Continuation>,
    continuation_rx: mpsc::Receiver<Continuation>,
    view_tx: watch::Sender<SessionView>,
    pub(super) events_tx: broadcast::Sender<SessionEvent>,
}

impl SessionActor {
    pub(crate) fn new(
        config: SessionConfig,
        deps: SessionDeps,
        command_rx: mpsc::Receiver<SessionCommand>,
        view_tx: watch::Sender<SessionView>,
        events_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::channel(256);
        let (continuation_tx, continuation_rx) = mpsc::channel(256);

        Self {
            reconciler: Reconciler::new(config.local_id, config.cooldown),
            config,
            links: PeerLinkTable::new(),
            candidates: CandidateQueues::default(),
            media: LocalMediaSource::new(deps.devices),
            remote_streams: Arc::new(BTreeMap::new()),
            transport_connected: deps.transport_connected,
            signaling: deps.signaling,
            roster_feed: deps.roster,
            factory: deps.connections,
            command_rx,
            link_tx,
            link_rx,
            continuation_tx,
            continuation_rx,
            view_tx,
            events_tx,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Session for member {} started", self.config.local_id);
        self.acquire_media();
        self.publish_view();

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Disconnect { reply }) => {
                            self.shutdown().await;
                            let _ = reply.send(());
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All session handles dropped. Leaving room.");
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                Some(evt) = self.link_rx.recv() => self.handle_link_event(evt).await,

                Some(cont) = self.continuation_rx.recv() => self.handle_continuation(cont).await,
            }

            self.publish_view();
        }

        info!("Session for member {} finished", self.config.local_id);
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::ConnectToPeer { peer, force } => {
                self.connect_to_peer(peer, force).await;
            }

            SessionCommand::UpdateRoster { peers } => {
                debug!("Roster update: {:?}", peers);
                for peer in self.reconciler.replace_roster(peers) {
                    if self.candidates.forget(&peer) {
                        debug!("Dropped queued candidates from departed peer {}", peer);
                    }
                }
                self.reconcile().await;
            }

            SessionCommand::DeliverSignal(message) => self.handle_signal(message).await,

            SessionCommand::TransportChanged { connected } => {
                self.handle_transport_changed(connected).await;
            }

            SessionCommand::StartScreenShare { reply } => self.start_screen_share(reply),

            SessionCommand::StopScreenShare { reply } => {
                let stopped = self.stop_screen_share().await;
                let _ = reply.send(stopped);
            }

            // Handled by the run loop.
            SessionCommand::Disconnect { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn handle_continuation(&mut self, cont: Continuation) {
        match cont {
            Continuation::Negotiation {
                peer,
                connection,
                result,
            } => self.handle_step_result(peer, connection, result).await,

            Continuation::AnswerTimeout { peer, connection } => {
                self.handle_answer_timeout(peer, connection).await;
            }

            Continuation::CooldownElapsed { generation } => {
                if self.reconciler.cooldown_mut().elapse(generation) {
                    info!("Cooldown cleared, retrying pending peers");
                    let _ = self.events_tx.send(SessionEvent::CooldownCleared);
                    self.retry_pending().await;
                }
            }

            Continuation::MediaAcquired(result) => self.handle_media_acquired(result).await,

            Continuation::DisplayAcquired { result, reply } => {
                let started = self.handle_display_acquired(result).await;
                let _ = reply.send(started);
            }

            Continuation::ScreenShareEnded { stream_id } => {
                if self.media.display_id() == Some(stream_id.as_str()) {
                    info!("Screen share {} ended outside the session", stream_id);
                    self.stop_screen_share().await;
                    let _ = self.events_tx.send(SessionEvent::ScreenShareEnded);
                }
            }
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        let peer = event.peer();
        let connection = event.connection();
        if !self.links.is_active(&peer, connection) {
            debug!(
                "Ignoring event from superseded connection {} of peer {}",
                connection, peer
            );
            return;
        }

        match event {
            LinkEvent::CandidateGenerated { candidate, .. } => {
                let message = SignalMessage::ice_candidate(self.config.local_id, peer, candidate);
                if !self.signaling.send_signal(message).await {
                    debug!("Local candidate for peer {} not sent: transport down", peer);
                }
            }

            LinkEvent::TrackAdded { track, .. } => self.add_remote_track(peer, track),

            LinkEvent::StateChanged { state, .. } => {
                if let Some(link) = self.links.get_mut(&peer) {
                    link.media = state;
                }

                if state.is_terminal() {
                    info!("Link to peer {} is {:?}, tearing down", peer, state);
                    self.discard_link(peer);
                    let _ = self.events_tx.send(SessionEvent::PeerDisconnected(peer));
                    self.reconcile().await;
                } else if state == MediaState::Connected {
                    info!("Media flowing with peer {}", peer);
                    let _ = self.events_tx.send(SessionEvent::PeerConnected(peer));
                }
            }
        }
    }

    async fn handle_transport_changed(&mut self, connected: bool) {
        let was_connected = std::mem::replace(&mut self.transport_connected, connected);
        if connected == was_connected {
            return;
        }

        if connected {
            info!("Signaling transport connected");
            self.roster_feed.request_refresh().await;
            self.retry_pending().await;
        } else {
            warn!("Signaling transport lost; outbound signals are dropped until it returns");
        }
    }

    /// Offers to every roster peer that has neither a link nor a pending record.
    pub(super) async fn reconcile(&mut self) {
        for peer in self.reconciler.unlinked(&self.links) {
            self.connect_to_peer(peer, false).await;
        }
    }

    /// Re-offers to every pending peer, discarding whatever link they have.
    pub(super) async fn retry_pending(&mut self) {
        if !self.media.is_ready() || self.reconciler.cooling_down() {
            return;
        }

        let pending: Vec<PeerId> = self.reconciler.pending().iter().copied().collect();
        if !pending.is_empty() {
            info!("Retrying offers to pending peers {:?}", pending);
        }
        for peer in pending {
            self.connect_to_peer(peer, true).await;
        }
    }

    pub(super) fn engage_cooldown(&mut self) {
        let cooldown = self.reconciler.cooldown_mut();
        let generation = cooldown.engage();
        let window = cooldown.window();
        warn!("Negotiation failure: suppressing new offers for {:?}", window);

        let tx = self.continuation_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = tx.send(Continuation::CooldownElapsed { generation }).await;
        });
        let _ = self.events_tx.send(SessionEvent::CooldownStarted);
    }

    /// Contains a failure to the link it happened on: the link is torn
    /// down, the peer goes back to pending and the room cools down.
    pub(super) fn fail_link(&mut self, peer: PeerId, connection: ConnectionId, err: anyhow::Error) {
        if !self.links.is_active(&peer, connection) {
            debug!(
                "Ignoring failure of superseded connection {} to peer {}: {:#}",
                connection, peer, err
            );
            return;
        }

        error!("Negotiation with peer {} failed: {:#}", peer, err);
        self.discard_link(peer);
        self.reconciler.defer(peer);
        let _ = self.events_tx.send(SessionEvent::LinkFailed {
            peer,
            reason: format!("{err:#}"),
        });
        self.engage_cooldown();
    }

    /// Removes the link and its remote stream and closes the connection in
    /// the background.
    pub(super) fn discard_link(&mut self, peer: PeerId) -> bool {
        let Some(link) = self.links.delete(&peer) else {
            return false;
        };
        self.remove_remote_stream(peer);

        let connection = link.connection;
        tokio::spawn(async move {
            if let Err(e) = connection.close().await {
                debug!("Closing connection {} failed: {:#}", connection.id(), e);
            }
        });
        true
    }

    fn add_remote_track(&mut self, peer: PeerId, track: RemoteTrack) {
        debug!("Remote {:?} track {} from peer {}", track.kind, track.id, peer);
        let mut streams = (*self.remote_streams).clone();
        streams
            .entry(peer)
            .or_insert_with(|| RemoteMediaStream::new(peer))
            .add_track(track);
        self.remote_streams = Arc::new(streams);
    }

    fn remove_remote_stream(&mut self, peer: PeerId) {
        if self.remote_streams.contains_key(&peer) {
            let mut streams = (*self.remote_streams).clone();
            streams.remove(&peer);
            self.remote_streams = Arc::new(streams);
        }
    }

    fn acquire_media(&self) {
        let devices = self.media.devices();
        let tx = self.continuation_tx.clone();
        tokio::spawn(async move {
            let result = devices.get_user_media().await;
            let _ = tx.send(Continuation::MediaAcquired(result)).await;
        });
    }

    async fn handle_media_acquired(&mut self, result: Result<LocalStream, MediaError>) {
        match result {
            Ok(stream) => {
                info!("Local media {} ready", stream.id);
                self.media.install_camera(stream);
                self.retry_pending().await;
            }
            Err(e) => {
                error!("Local media unavailable: {}", e);
                let _ = self.events_tx.send(SessionEvent::MediaError(e));
            }
        }
    }

    fn start_screen_share(&mut self, reply: oneshot::Sender<bool>) {
        if self.media.is_sharing() {
            let _ = reply.send(true);
            return;
        }

        let devices = self.media.devices();
        let tx = self.continuation_tx.clone();
        tokio::spawn(async move {
            let result = devices.get_display_media().await;
            let _ = tx.send(Continuation::DisplayAcquired { result, reply }).await;
        });
    }

    async fn handle_display_acquired(&mut self, result: Result<DisplayStream, MediaError>) -> bool {
        let mut screen = match result {
            Ok(screen) => screen,
            Err(e) => {
                warn!("Screen capture unavailable: {}", e);
                let _ = self.events_tx.send(SessionEvent::MediaError(e));
                return false;
            }
        };

        if self.media.is_sharing() {
            screen.stop();
            return true;
        }

        if let Some(ended) = screen.take_ended() {
            let stream_id = screen.id.clone();
            let tx = self.continuation_tx.clone();
            tokio::spawn(async move {
                if ended.await.is_ok() {
                    let _ = tx.send(Continuation::ScreenShareEnded { stream_id }).await;
                }
            });
        }

        info!("Sharing screen {} with {} peers", screen.id, self.links.len());
        let video = screen.video.clone();
        self.media.install_display(screen);
        self.replace_outbound_video(video).await;
        true
    }

    /// Puts the camera back on every link. Returns `false` when not sharing.
    async fn stop_screen_share(&mut self) -> bool {
        let Some(screen) = self.media.take_display() else {
            return false;
        };
        screen.stop();

        if let Some(camera) = self.media.camera_video() {
            self.replace_outbound_video(camera).await;
        }
        info!("Screen share {} stopped", screen.id);
        true
    }

    async fn replace_outbound_video(&self, track: LocalTrack) {
        for (peer, connection) in self.links.snapshot() {
            if let Err(e) = connection.replace_video_track(track.clone()).await {
                warn!("Could not swap outbound video for peer {}: {:#}", peer, e);
            }
        }
    }

    async fn shutdown(&mut self) {
        info!("Leaving room: closing {} links", self.links.len());

        let connections: Vec<(PeerId, Arc<dyn PeerConnection>)> = self.links.snapshot();
        self.links.clear();
        join_all(connections.into_iter().map(|(peer, connection)| async move {
            if let Err(e) = connection.close().await {
                warn!("Closing link to peer {} failed: {:#}", peer, e);
            }
        }))
        .await;

        self.media.stop_all();
        self.signaling.deactivate().await;

        self.candidates.clear();
        self.reconciler.reset();
        self.remote_streams = Arc::new(BTreeMap::new());
        self.transport_connected = false;
        self.publish_view();
    }

    fn publish_view(&self) {
        let view = SessionView {
            local_stream: self.media.camera().cloned(),
            remote_streams: self.remote_streams.clone(),
            cooling_down: self.reconciler.cooling_down(),
            pending_offers: self.reconciler.pending().clone(),
            media_ready: self.media.is_ready(),
            sharing_screen: self.media.is_sharing(),
            transport_connected: self.transport_connected,
            links: self
                .links
                .iter()
                .map(|link| {
                    (
                        link.peer,
                        LinkStatus {
                            negotiation: link.negotiation,
                            media: link.media,
                            awaiting_answer: link.awaiting_answer,
                        },
                    )
                })
                .collect(),
        };

        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}
