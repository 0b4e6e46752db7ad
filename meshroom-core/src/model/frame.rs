use crate::model::connection::SubscriptionId;
use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent by a client over the relay WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "camelCase")]
pub enum ClientFrame {
    Subscribe {
        id: SubscriptionId,
        destination: String,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    Send {
        destination: String,
        body: Value,
    },
    Heartbeat,
}

/// Frames pushed by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "camelCase")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Connected {
        member_id: PeerId,
        heartbeat_ms: u64,
    },
    Message {
        subscription: SubscriptionId,
        destination: String,
        body: Value,
    },
    Heartbeat,
    Error {
        message: String,
    },
}

impl ClientFrame {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerFrame {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
