use crate::media::LocalTrack;
use crate::transport::link_event::LinkEvent;
use anyhow::Result;
use async_trait::async_trait;
use meshroom_core::{ConnectionId, IceCandidate, PeerId, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Signaling state as reported by the connection primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

/// Aggregate transport state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl MediaState {
    /// States after which the connection will not recover on its own.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

/// One peer-connection instance. Never reused across negotiations: a
/// restart closes it and creates a new one with a fresh [`ConnectionId`].
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn peer(&self) -> PeerId;

    fn signaling_state(&self) -> SignalingState;

    async fn add_local_tracks(&self, audio: LocalTrack, video: LocalTrack) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Swaps the outbound video without renegotiating.
    async fn replace_video_track(&self, track: LocalTrack) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    /// Creates a connection to `peer` whose events are posted to `events`.
    async fn create(
        &self,
        peer: PeerId,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Arc<dyn PeerConnection>>;
}
