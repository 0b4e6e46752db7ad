use crate::error::MediaError;
use crate::media::{LocalStream, RemoteMediaStream};
use crate::session::link_table::NegotiationState;
use crate::transport::MediaState;
use meshroom_core::PeerId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub negotiation: NegotiationState,
    pub media: MediaState,
    pub awaiting_answer: bool,
}

/// Everything a UI renders, published as a whole on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    pub local_stream: Option<LocalStream>,
    pub remote_streams: Arc<BTreeMap<PeerId, RemoteMediaStream>>,
    /// Drives the "connection unstable, retrying" indicator.
    pub cooling_down: bool,
    pub pending_offers: BTreeSet<PeerId>,
    pub media_ready: bool,
    pub sharing_screen: bool,
    pub transport_connected: bool,
    pub links: BTreeMap<PeerId, LinkStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MediaError(MediaError),
    /// The shared screen was stopped outside the session.
    ScreenShareEnded,
    LinkFailed { peer: PeerId, reason: String },
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
    CooldownStarted,
    CooldownCleared,
}
