use crate::media::RemoteTrack;
use crate::transport::peer_connection::MediaState;
use meshroom_core::{ConnectionId, IceCandidate, PeerId};

/// Events raised by a peer connection instance. Each carries the id of the
/// instance that produced it so the session can drop events from connections
/// that have since been replaced.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    CandidateGenerated {
        peer: PeerId,
        connection: ConnectionId,
        candidate: IceCandidate,
    },
    TrackAdded {
        peer: PeerId,
        connection: ConnectionId,
        track: RemoteTrack,
    },
    StateChanged {
        peer: PeerId,
        connection: ConnectionId,
        state: MediaState,
    },
}

impl LinkEvent {
    pub fn peer(&self) -> PeerId {
        match self {
            Self::CandidateGenerated { peer, .. }
            | Self::TrackAdded { peer, .. }
            | Self::StateChanged { peer, .. } => *peer,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        match self {
            Self::CandidateGenerated { connection, .. }
            | Self::TrackAdded { connection, .. }
            | Self::StateChanged { connection, .. } => *connection,
        }
    }
}
