use meshroom_core::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("session has already shut down")]
    SessionClosed,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("signaling connection failed: {0}")]
    Signaling(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Capture failures surfaced to the UI as `SessionEvent::MediaError`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("capture cancelled by the user")]
    Cancelled,
}
