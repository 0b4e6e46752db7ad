use crate::config::ClientConfig;
use crate::error::MeshError;
use crate::media::{MediaDevices, SyntheticMediaDevices};
use crate::session::{MeshSession, SessionDeps};
use crate::signaling::{RoomRoster, RoomSignaling, SignalingClient};
use crate::transport::{PeerConnectionFactory, RtcConnectionFactory};
use meshroom_core::{Destination, OnlineParticipant, SignalMessage};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A participant wired to a relay: signaling client, session, and the
/// tasks that feed relay traffic into the session.
pub struct MeshClient {
    session: MeshSession,
    signaling: SignalingClient,
    forwarders: Vec<JoinHandle<()>>,
}

impl MeshClient {
    /// Joins with synthetic capture and webrtc-rs connections.
    pub async fn join(config: ClientConfig) -> Result<Self, MeshError> {
        let connections = Arc::new(RtcConnectionFactory::new(config.transport.clone()));
        Self::join_with(config, Arc::new(SyntheticMediaDevices::new()), connections).await
    }

    pub async fn join_with(
        config: ClientConfig,
        devices: Arc<dyn MediaDevices>,
        connections: Arc<dyn PeerConnectionFactory>,
    ) -> Result<Self, MeshError> {
        let local_id = config.session.local_id;
        let room = config.room.clone();
        let signaling = SignalingClient::connect(local_id, config.signaling.clone()).await?;

        let (_, mut inbox) = signaling
            .subscribe(&Destination::SignalInbox(local_id))
            .await;
        let (_, mut roster) = signaling
            .subscribe(&Destination::Participants(room.clone()))
            .await;

        let session = MeshSession::spawn(
            config.session,
            SessionDeps {
                signaling: Arc::new(RoomSignaling::new(signaling.clone(), room.clone())),
                roster: Arc::new(RoomRoster::new(signaling.clone(), room)),
                connections,
                devices,
                transport_connected: signaling.is_connected(),
            },
        );

        let mut forwarders = Vec::new();

        let inbox_session = session.clone();
        forwarders.push(tokio::spawn(async move {
            while let Some(body) = inbox.recv().await {
                match serde_json::from_value::<SignalMessage>(body) {
                    Ok(message) => inbox_session.deliver_signal(message).await,
                    Err(e) => warn!("Unreadable signal in inbox: {}", e),
                }
            }
        }));

        let roster_session = session.clone();
        forwarders.push(tokio::spawn(async move {
            while let Some(body) = roster.recv().await {
                match serde_json::from_value::<Vec<OnlineParticipant>>(body) {
                    Ok(participants) => {
                        let peers = participants.into_iter().map(|p| p.user_id).collect();
                        roster_session.update_roster(peers).await;
                    }
                    Err(e) => warn!("Unreadable roster: {}", e),
                }
            }
        }));

        let state_session = session.clone();
        let mut connected = signaling.connected();
        forwarders.push(tokio::spawn(async move {
            loop {
                let is_connected = *connected.borrow_and_update();
                state_session.transport_changed(is_connected).await;
                if connected.changed().await.is_err() {
                    break;
                }
            }
            debug!("Connection state forwarder finished");
        }));

        Ok(Self {
            session,
            signaling,
            forwarders,
        })
    }

    pub fn session(&self) -> &MeshSession {
        &self.session
    }

    pub fn signaling(&self) -> &SignalingClient {
        &self.signaling
    }

    /// Leaves the room and stops forwarding relay traffic.
    pub async fn leave(self) {
        self.session.disconnect().await;
        for task in self.forwarders {
            task.abort();
        }
    }
}
