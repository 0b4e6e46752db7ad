mod connection;
mod destination;
mod frame;
mod peer;
mod room;
mod roster;
mod signaling;

pub use connection::{ConnectionId, SubscriptionId};
pub use destination::Destination;
pub use frame::{ClientFrame, ServerFrame};
pub use peer::PeerId;
pub use room::RoomId;
pub use roster::OnlineParticipant;
pub use signaling::{
    IceCandidate, IceServerConfig, SdpType, SessionDescription, Signal, SignalKind,
    SignalMessage, SignalPayload,
};
