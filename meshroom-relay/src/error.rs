use meshroom_core::{PeerId, ProtocolError};
use thiserror::Error;

/// Reasons a client frame is rejected. Sent back to the client as an
/// `Error` frame; the connection stays open.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid signal body: {0}")]
    InvalidSignal(#[from] serde_json::Error),

    #[error("member {member} may not subscribe to {destination}")]
    ForbiddenSubscription { member: PeerId, destination: String },

    #[error("{0} cannot be subscribed to")]
    NotSubscribable(String),

    #[error("{0} does not accept messages")]
    NotPublishable(String),

    #[error("member {member} cannot send signals as {claimed}")]
    SpoofedSender { member: PeerId, claimed: PeerId },
}
