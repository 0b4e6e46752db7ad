mod link_event;
mod peer_connection;
mod rtc_connection;
mod transport_config;

pub use link_event::LinkEvent;
pub use peer_connection::{MediaState, PeerConnection, PeerConnectionFactory, SignalingState};
pub use rtc_connection::{RtcConnectionFactory, RtcPeerConnection};
pub use transport_config::TransportConfig;
