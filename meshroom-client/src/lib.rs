pub mod client;
pub mod config;
pub mod error;
pub mod media;
pub mod session;
pub mod signaling;
pub mod transport;

pub use client::MeshClient;
pub use config::{ClientConfig, GlarePolicy, SessionConfig, SignalingConfig};
pub use error::{MediaError, MeshError};
pub use session::{MeshSession, SessionDeps, SessionEvent, SessionView};
pub use transport::TransportConfig;
