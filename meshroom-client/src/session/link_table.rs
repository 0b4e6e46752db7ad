use crate::transport::{MediaState, PeerConnection};
use meshroom_core::{ConnectionId, IceCandidate, PeerId};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

/// Negotiation progress of one link, mirroring the primitive's signaling
/// state plus `Idle` (created, offer not yet produced).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    HaveLocalOffer,
    HaveRemoteOffer,
    Stable,
    Closed,
}

impl NegotiationState {
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::HaveLocalOffer | Self::HaveRemoteOffer
        )
    }
}

pub struct PeerLink {
    pub peer: PeerId,
    pub connection: Arc<dyn PeerConnection>,
    pub negotiation: NegotiationState,
    pub media: MediaState,
    pub awaiting_answer: bool,
    pub has_remote_description: bool,
}

impl PeerLink {
    pub fn new(peer: PeerId, connection: Arc<dyn PeerConnection>) -> Self {
        Self {
            peer,
            connection,
            negotiation: NegotiationState::Idle,
            media: MediaState::New,
            awaiting_answer: false,
            has_remote_description: false,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Candidates may only be applied once the remote description is set.
    pub fn accepts_candidates(&self) -> bool {
        self.has_remote_description && self.negotiation != NegotiationState::Closed
    }
}

/// Identity-keyed table of active links. Only the session task touches it.
#[derive(Default)]
pub struct PeerLinkTable {
    links: BTreeMap<PeerId, PeerLink>,
}

impl PeerLinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, peer: &PeerId) -> Option<&PeerLink> {
        self.links.get(peer)
    }

    pub fn get_mut(&mut self, peer: &PeerId) -> Option<&mut PeerLink> {
        self.links.get_mut(peer)
    }

    /// The link for `peer`, if `connection` is still its active instance.
    pub fn active_mut(&mut self, peer: &PeerId, connection: ConnectionId) -> Option<&mut PeerLink> {
        self.links
            .get_mut(peer)
            .filter(|link| link.connection_id() == connection)
    }

    pub fn is_active(&self, peer: &PeerId, connection: ConnectionId) -> bool {
        self.links
            .get(peer)
            .is_some_and(|link| link.connection_id() == connection)
    }

    /// Inserts `link`, returning the entry it replaced.
    pub fn set(&mut self, link: PeerLink) -> Option<PeerLink> {
        self.links.insert(link.peer, link)
    }

    pub fn delete(&mut self, peer: &PeerId) -> Option<PeerLink> {
        self.links.remove(peer)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.links.contains_key(peer)
    }

    pub fn snapshot(&self) -> Vec<(PeerId, Arc<dyn PeerConnection>)> {
        self.links
            .iter()
            .map(|(peer, link)| (*peer, link.connection.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerLink> {
        self.links.values()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }
}

/// Remote ICE candidates waiting for a remote description, kept per sender
/// so they outlive any single link.
#[derive(Default)]
pub struct CandidateQueues {
    queues: HashMap<PeerId, VecDeque<IceCandidate>>,
}

impl CandidateQueues {
    pub fn push(&mut self, peer: PeerId, candidate: IceCandidate) {
        self.queues.entry(peer).or_default().push_back(candidate);
    }

    /// Removes and returns everything queued for `peer`, oldest first.
    pub fn take(&mut self, peer: &PeerId) -> VecDeque<IceCandidate> {
        self.queues.remove(peer).unwrap_or_default()
    }

    pub fn len(&self, peer: &PeerId) -> usize {
        self.queues.get(peer).map_or(0, VecDeque::len)
    }

    pub fn forget(&mut self, peer: &PeerId) -> bool {
        self.queues.remove(peer).is_some()
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }
}
