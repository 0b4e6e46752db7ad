use crate::ProtocolError;
use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SdpType {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

/// Flat payload as it travels between browsers and native clients alike:
/// SDP fields for offers/answers, candidate fields for ICE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPayload {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub sdp_type: Option<SdpType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
}

/// Point-to-point negotiation message, addressed by receiver identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalMessage {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub payload: SignalPayload,
    pub sender_id: PeerId,
    pub receiver_id: PeerId,
}

/// Decoded form of a [`SignalMessage`] payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
}

impl SignalMessage {
    pub fn new(sender_id: PeerId, receiver_id: PeerId, signal: Signal) -> Self {
        let (kind, payload) = match signal {
            Signal::Offer(desc) => (SignalKind::Offer, Self::description_payload(desc)),
            Signal::Answer(desc) => (SignalKind::Answer, Self::description_payload(desc)),
            Signal::IceCandidate(ice) => (
                SignalKind::IceCandidate,
                SignalPayload {
                    candidate: Some(ice.candidate),
                    sdp_mid: ice.sdp_mid,
                    sdp_m_line_index: ice.sdp_m_line_index,
                    ..Default::default()
                },
            ),
        };

        Self {
            kind,
            payload,
            sender_id,
            receiver_id,
        }
    }

    pub fn offer(sender_id: PeerId, receiver_id: PeerId, sdp: impl Into<String>) -> Self {
        Self::new(
            sender_id,
            receiver_id,
            Signal::Offer(SessionDescription::offer(sdp)),
        )
    }

    pub fn answer(sender_id: PeerId, receiver_id: PeerId, sdp: impl Into<String>) -> Self {
        Self::new(
            sender_id,
            receiver_id,
            Signal::Answer(SessionDescription::answer(sdp)),
        )
    }

    pub fn ice_candidate(sender_id: PeerId, receiver_id: PeerId, candidate: IceCandidate) -> Self {
        Self::new(sender_id, receiver_id, Signal::IceCandidate(candidate))
    }

    fn description_payload(desc: SessionDescription) -> SignalPayload {
        SignalPayload {
            sdp_type: Some(desc.sdp_type),
            sdp: Some(desc.sdp),
            ..Default::default()
        }
    }

    /// Validates the flat payload against `kind` and returns the typed signal.
    pub fn decode(&self) -> Result<Signal, ProtocolError> {
        match self.kind {
            SignalKind::Offer => self.description(SdpType::Offer).map(Signal::Offer),
            SignalKind::Answer => self.description(SdpType::Answer).map(Signal::Answer),
            SignalKind::IceCandidate => {
                let candidate =
                    self.payload
                        .candidate
                        .clone()
                        .ok_or(ProtocolError::MissingField {
                            kind: self.kind,
                            field: "candidate",
                        })?;
                Ok(Signal::IceCandidate(IceCandidate {
                    candidate,
                    sdp_mid: self.payload.sdp_mid.clone(),
                    sdp_m_line_index: self.payload.sdp_m_line_index,
                }))
            }
        }
    }

    fn description(&self, expected: SdpType) -> Result<SessionDescription, ProtocolError> {
        if let Some(found) = self.payload.sdp_type {
            if found != expected {
                return Err(ProtocolError::MismatchedSdpType {
                    kind: self.kind,
                    found,
                });
            }
        }
        let sdp = self.payload.sdp.clone().ok_or(ProtocolError::MissingField {
            kind: self.kind,
            field: "sdp",
        })?;
        Ok(SessionDescription {
            sdp_type: expected,
            sdp,
        })
    }
}
