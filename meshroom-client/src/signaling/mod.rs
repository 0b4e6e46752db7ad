mod room_signaling;
mod signaling_client;
mod signaling_output;

pub use room_signaling::{RoomRoster, RoomSignaling};
pub use signaling_client::{SignalingClient, next_backoff};
pub use signaling_output::{RosterFeed, SignalingOutput};
