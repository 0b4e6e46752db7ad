use crate::media::{LocalTrack, RemoteTrack, TrackKind};
use crate::transport::link_event::LinkEvent;
use crate::transport::peer_connection::{
    MediaState, PeerConnection, PeerConnectionFactory, SignalingState,
};
use crate::transport::transport_config::TransportConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use meshroom_core::{ConnectionId, IceCandidate, PeerId, SdpType, SessionDescription};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_remote::TrackRemote;

/// Builds webrtc-rs peer connections from a [`TransportConfig`].
#[derive(Debug, Clone, Default)]
pub struct RtcConnectionFactory {
    config: TransportConfig,
}

impl RtcConnectionFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PeerConnectionFactory for RtcConnectionFactory {
    async fn create(
        &self,
        peer: PeerId,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Arc<dyn PeerConnection>> {
        let connection = RtcPeerConnection::new(peer, &self.config, events).await?;
        Ok(Arc::new(connection))
    }
}

pub struct RtcPeerConnection {
    id: ConnectionId,
    peer: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
    video_sender: Mutex<Option<Arc<RTCRtpSender>>>,
}

impl RtcPeerConnection {
    /// Creates the connection and wires its callbacks into `event_tx`.
    pub async fn new(
        peer: PeerId,
        config: &TransportConfig,
        event_tx: mpsc::Sender<LinkEvent>,
    ) -> Result<Self> {
        let id = ConnectionId::new();

        // 1. Codecs for Opus/VP8 and friends
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        // 2. NACK, RTCP reports, TWCC
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        // 3. STUN/TURN
        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        // A. Connection state
        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!("Connection {} to peer {} is {}", id, peer, s);
                    let state = media_state(s);
                    let _ = tx
                        .send(LinkEvent::StateChanged {
                            peer,
                            connection: id,
                            state,
                        })
                        .await;
                })
            },
        ));

        // B. Trickle ICE
        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                };
                let _ = tx
                    .send(LinkEvent::CandidateGenerated {
                        peer,
                        connection: id,
                        candidate,
                    })
                    .await;
            })
        }));

        // C. Remote media
        let track_tx = event_tx;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        _ => TrackKind::Video,
                    };
                    debug!("Remote {:?} track {} from peer {}", kind, track.id(), peer);

                    let mut remote = RemoteTrack::new(track.id(), track.stream_id(), kind);
                    remote.remote = Some(track);
                    let _ = tx
                        .send(LinkEvent::TrackAdded {
                            peer,
                            connection: id,
                            track: remote,
                        })
                        .await;
                })
            },
        ));

        Ok(Self {
            id,
            peer,
            peer_connection,
            video_sender: Mutex::new(None),
        })
    }

    async fn add_track(&self, track: LocalTrack) -> Result<Arc<RTCRtpSender>> {
        let sender = self
            .peer_connection
            .add_track(track)
            .await
            .context("Failed to add local track")?;

        // RTCP must be drained for the interceptors to run.
        let rtcp_sender = sender.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut buf).await.is_ok() {}
        });

        Ok(sender)
    }
}

#[async_trait]
impl PeerConnection for RtcPeerConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer(&self) -> PeerId {
        self.peer
    }

    fn signaling_state(&self) -> SignalingState {
        match self.peer_connection.signaling_state() {
            RTCSignalingState::HaveLocalOffer => SignalingState::HaveLocalOffer,
            RTCSignalingState::HaveRemoteOffer => SignalingState::HaveRemoteOffer,
            RTCSignalingState::HaveLocalPranswer => SignalingState::HaveLocalPranswer,
            RTCSignalingState::HaveRemotePranswer => SignalingState::HaveRemotePranswer,
            RTCSignalingState::Closed => SignalingState::Closed,
            _ => SignalingState::Stable,
        }
    }

    async fn add_local_tracks(&self, audio: LocalTrack, video: LocalTrack) -> Result<()> {
        self.add_track(audio).await?;
        let video_sender = self.add_track(video).await?;
        *self.video_sender.lock().await = Some(video_sender);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc(desc)?)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(desc)?)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            ..Default::default()
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn replace_video_track(&self, track: LocalTrack) -> Result<()> {
        let sender = self
            .video_sender
            .lock()
            .await
            .clone()
            .context("Connection has no outbound video")?;
        sender
            .replace_track(Some(track))
            .await
            .context("Failed to replace video track")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
    };
    Ok(rtc)
}

fn media_state(state: RTCPeerConnectionState) -> MediaState {
    match state {
        RTCPeerConnectionState::Connecting => MediaState::Connecting,
        RTCPeerConnectionState::Connected => MediaState::Connected,
        RTCPeerConnectionState::Disconnected => MediaState::Disconnected,
        RTCPeerConnectionState::Failed => MediaState::Failed,
        RTCPeerConnectionState::Closed => MediaState::Closed,
        _ => MediaState::New,
    }
}
