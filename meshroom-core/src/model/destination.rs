use crate::ProtocolError;
use crate::model::peer::PeerId;
use crate::model::room::RoomId;
use std::fmt;
use std::str::FromStr;

/// Topic names understood by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// `/pub/signal/{room}`
    SignalPublish(RoomId),
    /// `/sub/signal/user/{member}`
    SignalInbox(PeerId),
    /// `/sub/chatroom/{room}/participants`
    Participants(RoomId),
    /// `/pub/chatroom/{room}/request-participants`
    RequestParticipants(RoomId),
}

impl Destination {
    pub fn is_subscribable(&self) -> bool {
        matches!(self, Self::SignalInbox(_) | Self::Participants(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignalPublish(room) => write!(f, "/pub/signal/{room}"),
            Self::SignalInbox(member) => write!(f, "/sub/signal/user/{member}"),
            Self::Participants(room) => write!(f, "/sub/chatroom/{room}/participants"),
            Self::RequestParticipants(room) => {
                write!(f, "/pub/chatroom/{room}/request-participants")
            }
        }
    }
}

impl FromStr for Destination {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ProtocolError::UnknownDestination(s.to_string());
        let parts: Vec<&str> = s.trim_start_matches('/').split('/').collect();

        match parts.as_slice() {
            ["pub", "signal", room] if !room.is_empty() => {
                Ok(Self::SignalPublish(RoomId::from(*room)))
            }
            ["sub", "signal", "user", member] => Ok(Self::SignalInbox(member.parse()?)),
            ["sub", "chatroom", room, "participants"] if !room.is_empty() => {
                Ok(Self::Participants(RoomId::from(*room)))
            }
            ["pub", "chatroom", room, "request-participants"] if !room.is_empty() => {
                Ok(Self::RequestParticipants(RoomId::from(*room)))
            }
            _ => Err(unknown()),
        }
    }
}
