use thiserror::Error;

/// Errors raised while decoding wire-level messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("signal of kind {kind:?} is missing `{field}`")]
    MissingField {
        kind: crate::SignalKind,
        field: &'static str,
    },

    #[error("signal payload type {found:?} does not match kind {kind:?}")]
    MismatchedSdpType {
        kind: crate::SignalKind,
        found: crate::SdpType,
    },

    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
