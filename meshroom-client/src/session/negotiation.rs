use crate::config::GlarePolicy;
use crate::session::link_table::{NegotiationState, PeerLink};
use crate::session::session::SessionActor;
use crate::session::step::{Continuation, NegotiationStep, StepOutcome};
use crate::transport::{PeerConnection, SignalingState};
use anyhow::Context;
use meshroom_core::{
    ConnectionId, IceCandidate, PeerId, SessionDescription, Signal, SignalMessage,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl SessionActor {
    /// Originates an offer to `peer`, or records it as pending when an offer
    /// cannot go out right now. With `force` any existing link is discarded
    /// first; without it a link that is negotiating or carrying media is left
    /// alone.
    pub(super) async fn connect_to_peer(&mut self, peer: PeerId, force: bool) {
        if peer == self.config.local_id {
            return;
        }

        let blocked = if !self.media.is_ready() {
            Some("local media not ready")
        } else if self.reconciler.cooling_down() {
            Some("cooling down")
        } else if !self.transport_connected {
            Some("signaling transport down")
        } else {
            None
        };
        if let Some(reason) = blocked {
            debug!("Deferring offer to peer {}: {}", peer, reason);
            self.reconciler.defer(peer);
            return;
        }

        if let Some(link) = self.links.get(&peer) {
            if !force && (link.negotiation.is_in_flight() || link.media.is_live()) {
                debug!(
                    "Link to peer {} already {:?}/{:?}, not re-offering",
                    peer, link.negotiation, link.media
                );
                return;
            }
            debug!("Discarding {:?} link to peer {}", link.negotiation, peer);
            self.discard_link(peer);
        }

        let Some(connection) = self.open_connection(peer).await else {
            return;
        };

        info!("Creating offer for peer {} on connection {}", peer, connection.id());
        self.links.set(PeerLink::new(peer, connection.clone()));
        NegotiationStep::CreateOffer.spawn(peer, connection, self.continuation_tx.clone());
    }

    /// Creates a connection with the current outbound tracks attached.
    async fn open_connection(&mut self, peer: PeerId) -> Option<Arc<dyn PeerConnection>> {
        let Some((audio, video)) = self.media.outbound_tracks() else {
            self.reconciler.defer(peer);
            return None;
        };

        let connection = match self
            .factory
            .create(peer, self.link_tx.clone())
            .await
            .context("creating peer connection")
        {
            Ok(connection) => connection,
            Err(e) => return self.abandon_open(peer, e),
        };

        if let Err(e) = connection.add_local_tracks(audio, video).await {
            let _ = connection.close().await;
            return self.abandon_open(peer, e.context("attaching local tracks"));
        }

        Some(connection)
    }

    fn abandon_open(&mut self, peer: PeerId, err: anyhow::Error) -> Option<Arc<dyn PeerConnection>> {
        error!("Could not open a connection to peer {}: {:#}", peer, err);
        self.reconciler.defer(peer);
        self.engage_cooldown();
        None
    }

    pub(super) async fn handle_signal(&mut self, message: SignalMessage) {
        let peer = message.sender_id;
        if message.receiver_id != self.config.local_id || peer == self.config.local_id {
            warn!(
                "Dropping signal from {} addressed to {}",
                peer, message.receiver_id
            );
            return;
        }

        let signal = match message.decode() {
            Ok(signal) => signal,
            Err(e) => {
                warn!("Malformed signal from peer {}: {}", peer, e);
                return;
            }
        };

        match signal {
            Signal::Offer(offer) => self.on_remote_offer(peer, offer).await,
            Signal::Answer(answer) => self.on_remote_answer(peer, answer),
            Signal::IceCandidate(candidate) => self.on_remote_candidate(peer, candidate).await,
        }
    }

    async fn on_remote_offer(&mut self, peer: PeerId, offer: SessionDescription) {
        if !self.media.is_ready() {
            warn!("Dropping offer from peer {}: local media not ready", peer);
            return;
        }

        let reusable = match self.links.get(&peer) {
            Some(link) => match link.negotiation {
                NegotiationState::Idle => Some(link.connection.clone()),
                NegotiationState::HaveLocalOffer => {
                    if self.config.glare_policy == GlarePolicy::LowerIdYields
                        && self.config.local_id > peer
                    {
                        info!("Glare with peer {}: keeping our offer", peer);
                        return;
                    }
                    info!("Glare with peer {}: yielding to their offer", peer);
                    None
                }
                _ => None,
            },
            None => None,
        };

        let connection = match reusable {
            Some(connection) => connection,
            None => {
                self.discard_link(peer);
                let Some(connection) = self.open_connection(peer).await else {
                    return;
                };
                self.links.set(PeerLink::new(peer, connection.clone()));
                connection
            }
        };

        if let Some(link) = self.links.get_mut(&peer) {
            link.negotiation = NegotiationState::HaveRemoteOffer;
            link.awaiting_answer = false;
        }
        info!("Accepting offer from peer {} on connection {}", peer, connection.id());
        NegotiationStep::ApplyRemoteOffer(offer).spawn(
            peer,
            connection,
            self.continuation_tx.clone(),
        );
    }

    fn on_remote_answer(&mut self, peer: PeerId, answer: SessionDescription) {
        let Some(link) = self.links.get(&peer) else {
            warn!("Answer from peer {} without a link", peer);
            return;
        };
        if link.negotiation != NegotiationState::HaveLocalOffer {
            warn!(
                "Ignoring answer from peer {} for a superseded offer ({:?})",
                peer, link.negotiation
            );
            return;
        }

        debug!("Applying answer from peer {}", peer);
        NegotiationStep::ApplyRemoteAnswer(answer).spawn(
            peer,
            link.connection.clone(),
            self.continuation_tx.clone(),
        );
    }

    async fn on_remote_candidate(&mut self, peer: PeerId, candidate: IceCandidate) {
        self.candidates.push(peer, candidate);
        self.drain_candidates(peer).await;
    }

    /// Applies queued candidates in arrival order once the active link has a
    /// remote description; otherwise they stay queued.
    async fn drain_candidates(&mut self, peer: PeerId) {
        let Some(link) = self.links.get(&peer) else {
            return;
        };
        if !link.accepts_candidates() {
            debug!(
                "Holding {} candidates from peer {} until a remote description is set",
                self.candidates.len(&peer),
                peer
            );
            return;
        }

        let connection = link.connection.clone();
        for candidate in self.candidates.take(&peer) {
            if let Err(e) = connection.add_ice_candidate(candidate).await {
                self.fail_link(peer, connection.id(), e);
                return;
            }
        }
    }

    pub(super) async fn handle_step_result(
        &mut self,
        peer: PeerId,
        connection: ConnectionId,
        result: anyhow::Result<StepOutcome>,
    ) {
        if !self.links.is_active(&peer, connection) {
            debug!(
                "Dropping step result for superseded connection {} of peer {}",
                connection, peer
            );
            return;
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail_link(peer, connection, e);
                return;
            }
        };

        match outcome {
            StepOutcome::OfferCreated(offer) => self.on_offer_created(peer, connection, offer),

            StepOutcome::LocalOfferApplied(offer) => {
                self.on_local_offer_applied(peer, connection, offer).await;
            }

            StepOutcome::RemoteOfferApplied => {
                let Some(link) = self.links.active_mut(&peer, connection) else {
                    return;
                };
                link.has_remote_description = true;
                let connection = link.connection.clone();
                NegotiationStep::CreateAnswer.spawn(peer, connection, self.continuation_tx.clone());
            }

            StepOutcome::AnswerApplied(answer) => {
                if let Some(link) = self.links.active_mut(&peer, connection) {
                    link.negotiation = NegotiationState::Stable;
                }
                let message = SignalMessage::answer(self.config.local_id, peer, answer.sdp);
                if self.signaling.send_signal(message).await {
                    info!("Sent answer to peer {}", peer);
                } else {
                    warn!("Answer to peer {} not sent: transport down", peer);
                }
                self.reconciler.resolve(&peer);
                self.drain_candidates(peer).await;
            }

            StepOutcome::RemoteAnswerApplied => {
                if let Some(link) = self.links.active_mut(&peer, connection) {
                    link.negotiation = NegotiationState::Stable;
                    link.awaiting_answer = false;
                    link.has_remote_description = true;
                }
                info!("Negotiation with peer {} complete", peer);
                self.reconciler.resolve(&peer);
                self.drain_candidates(peer).await;
            }
        }
    }

    fn on_offer_created(&mut self, peer: PeerId, connection: ConnectionId, offer: SessionDescription) {
        let Some(link) = self.links.active_mut(&peer, connection) else {
            return;
        };

        // An inbound offer may have been accepted on this connection while
        // ours was being created.
        if link.connection.signaling_state() != SignalingState::Stable
            || link.negotiation != NegotiationState::Idle
        {
            warn!(
                "Offer to peer {} raced an inbound negotiation ({:?}), deferring",
                peer, link.negotiation
            );
            self.reconciler.defer(peer);
            return;
        }

        link.negotiation = NegotiationState::HaveLocalOffer;
        link.awaiting_answer = true;
        let connection = link.connection.clone();
        NegotiationStep::ApplyLocalOffer(offer).spawn(peer, connection, self.continuation_tx.clone());
    }

    async fn on_local_offer_applied(
        &mut self,
        peer: PeerId,
        connection: ConnectionId,
        offer: SessionDescription,
    ) {
        let message = SignalMessage::offer(self.config.local_id, peer, offer.sdp);
        if self.signaling.send_signal(message).await {
            info!("Sent offer to peer {}", peer);
        } else {
            warn!("Offer to peer {} not sent: transport down", peer);
            self.reconciler.defer(peer);
        }

        let timeout = self.config.answer_timeout;
        let tx = self.continuation_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(Continuation::AnswerTimeout { peer, connection }).await;
        });
    }

    pub(super) async fn handle_answer_timeout(&mut self, peer: PeerId, connection: ConnectionId) {
        let Some(link) = self.links.active_mut(&peer, connection) else {
            return;
        };
        if !link.awaiting_answer || link.negotiation != NegotiationState::HaveLocalOffer {
            return;
        }

        if !self.reconciler.roster().contains(&peer) {
            info!("Peer {} left without answering, dropping the link", peer);
            self.discard_link(peer);
            return;
        }

        warn!(
            "No answer from peer {} within {:?}, re-offering",
            peer, self.config.answer_timeout
        );
        self.reconciler.defer(peer);
        self.connect_to_peer(peer, true).await;
    }
}
