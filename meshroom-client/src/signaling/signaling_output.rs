use async_trait::async_trait;
use meshroom_core::SignalMessage;

/// Outbound half of the signaling transport as seen by a session.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Publishes `message` to its receiver. Returns `false` when the
    /// transport is down; nothing is queued.
    async fn send_signal(&self, message: SignalMessage) -> bool;

    /// Stops the transport for good. Idempotent.
    async fn deactivate(&self);
}

/// Source of roster snapshots.
#[async_trait]
pub trait RosterFeed: Send + Sync {
    /// Asks for the current roster to be re-broadcast.
    async fn request_refresh(&self);
}
