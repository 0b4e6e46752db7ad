use meshroom_core::PeerId;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

pub fn opus_track(id: impl Into<String>, stream_id: impl Into<String>) -> Arc<TrackLocalStaticSample> {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            channels: 2,
            ..Default::default()
        },
        id.into(),
        stream_id.into(),
    ))
}

pub fn vp8_track(id: impl Into<String>, stream_id: impl Into<String>) -> Arc<TrackLocalStaticSample> {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            ..Default::default()
        },
        id.into(),
        stream_id.into(),
    ))
}

/// Stop switch shared by every clone of a captured stream. Producers watch
/// the receiver and stop when it flips or when the last handle is dropped.
#[derive(Clone)]
pub struct CaptureHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl CaptureHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self {
                stop_tx: Arc::new(stop_tx),
            },
            stop_rx,
        )
    }

    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }
}

/// Camera and microphone capture, attached to every peer link.
#[derive(Clone)]
pub struct LocalStream {
    pub id: String,
    pub audio: LocalTrack,
    pub video: LocalTrack,
    capture: CaptureHandle,
}

impl LocalStream {
    pub fn new(id: impl Into<String>, audio: LocalTrack, video: LocalTrack, capture: CaptureHandle) -> Self {
        Self {
            id: id.into(),
            audio,
            video,
            capture,
        }
    }

    pub fn stop(&self) {
        self.capture.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.capture.is_stopped()
    }
}

impl fmt::Debug for LocalStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStream")
            .field("id", &self.id)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl PartialEq for LocalStream {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// A screen capture. `ended` resolves when the capture is stopped from
/// outside the session (the OS "stop sharing" control); it is dropped
/// without resolving when the session stops the capture itself.
pub struct DisplayStream {
    pub id: String,
    pub video: LocalTrack,
    capture: CaptureHandle,
    ended: Option<oneshot::Receiver<()>>,
}

impl DisplayStream {
    pub fn new(
        id: impl Into<String>,
        video: LocalTrack,
        capture: CaptureHandle,
        ended: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            id: id.into(),
            video,
            capture,
            ended: Some(ended),
        }
    }

    pub fn take_ended(&mut self) -> Option<oneshot::Receiver<()>> {
        self.ended.take()
    }

    pub fn stop(&self) {
        self.capture.stop();
    }
}

impl fmt::Debug for DisplayStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayStream")
            .field("id", &self.id)
            .field("stopped", &self.capture.is_stopped())
            .finish()
    }
}

/// A track received from a remote peer. `remote` is populated by the
/// webrtc binding and lets consumers read the RTP stream.
#[derive(Clone)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
    pub remote: Option<Arc<TrackRemote>>,
}

impl RemoteTrack {
    pub fn new(id: impl Into<String>, stream_id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            stream_id: stream_id.into(),
            kind,
            remote: None,
        }
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .finish()
    }
}

impl PartialEq for RemoteTrack {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.stream_id == other.stream_id && self.kind == other.kind
    }
}

/// Media received from one peer over its active link.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMediaStream {
    pub peer: PeerId,
    pub tracks: Vec<RemoteTrack>,
}

impl RemoteMediaStream {
    pub fn new(peer: PeerId) -> Self {
        Self {
            peer,
            tracks: Vec::new(),
        }
    }

    /// Adds `track`, replacing an earlier track with the same id.
    pub fn add_track(&mut self, track: RemoteTrack) {
        self.tracks.retain(|t| t.id != track.id);
        self.tracks.push(track);
    }

    pub fn has(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }
}
