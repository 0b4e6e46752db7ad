use meshroom_core::{PeerId, SignalMessage};
use tokio::sync::oneshot;

/// Requests posted to the session task by [`MeshSession`](super::MeshSession).
#[derive(Debug)]
pub enum SessionCommand {
    ConnectToPeer { peer: PeerId, force: bool },

    /// A new roster snapshot, replacing the previous one.
    UpdateRoster { peers: Vec<PeerId> },

    /// A signal addressed to this member.
    DeliverSignal(SignalMessage),

    TransportChanged { connected: bool },

    StartScreenShare { reply: oneshot::Sender<bool> },

    StopScreenShare { reply: oneshot::Sender<bool> },

    /// Leave the room; replied to once every link is closed.
    Disconnect { reply: oneshot::Sender<()> },
}
