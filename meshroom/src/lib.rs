pub use meshroom_core::{PeerId, RoomId, SignalMessage};

pub mod model {
    pub use meshroom_core::model::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use meshroom_relay::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use meshroom_client::*;
}
