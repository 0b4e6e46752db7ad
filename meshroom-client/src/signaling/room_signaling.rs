use crate::signaling::signaling_client::SignalingClient;
use crate::signaling::signaling_output::{RosterFeed, SignalingOutput};
use async_trait::async_trait;
use meshroom_core::{Destination, RoomId, SignalMessage};
use serde_json::Value;
use tracing::warn;

/// Publishes a session's signals on its room's signal destination.
pub struct RoomSignaling {
    client: SignalingClient,
    destination: Destination,
}

impl RoomSignaling {
    pub fn new(client: SignalingClient, room: RoomId) -> Self {
        Self {
            client,
            destination: Destination::SignalPublish(room),
        }
    }
}

#[async_trait]
impl SignalingOutput for RoomSignaling {
    async fn send_signal(&self, message: SignalMessage) -> bool {
        match serde_json::to_value(&message) {
            Ok(body) => self.client.publish(&self.destination, body).await,
            Err(e) => {
                warn!("Could not encode signal for {}: {}", message.receiver_id, e);
                false
            }
        }
    }

    async fn deactivate(&self) {
        self.client.deactivate().await;
    }
}

/// Asks the relay to re-broadcast a room's roster.
pub struct RoomRoster {
    client: SignalingClient,
    destination: Destination,
}

impl RoomRoster {
    pub fn new(client: SignalingClient, room: RoomId) -> Self {
        Self {
            client,
            destination: Destination::RequestParticipants(room),
        }
    }
}

#[async_trait]
impl RosterFeed for RoomRoster {
    async fn request_refresh(&self) {
        self.client.publish(&self.destination, Value::Null).await;
    }
}
