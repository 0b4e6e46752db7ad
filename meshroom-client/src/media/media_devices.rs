use crate::error::MediaError;
use crate::media::local_stream::{
    CaptureHandle, DisplayStream, LocalStream, opus_track, vp8_track,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::debug;
use uuid::Uuid;
use webrtc::media::Sample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Source of capture streams. Implementations decide where frames come from.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Camera + microphone.
    async fn get_user_media(&self) -> Result<LocalStream, MediaError>;

    /// A screen capture.
    async fn get_display_media(&self) -> Result<DisplayStream, MediaError>;
}

const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];
const OPUS_FRAME: Duration = Duration::from_millis(20);
const VIDEO_FRAME: Duration = Duration::from_millis(100);

/// Headless capture: Opus silence and a placeholder VP8 payload, written on
/// a fixed cadence until the stream is stopped.
#[derive(Debug, Clone, Default)]
pub struct SyntheticMediaDevices;

impl SyntheticMediaDevices {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaDevices for SyntheticMediaDevices {
    async fn get_user_media(&self) -> Result<LocalStream, MediaError> {
        let stream_id = format!("camera-{}", Uuid::new_v4());
        let audio = opus_track("audio", stream_id.clone());
        let video = vp8_track("video", stream_id.clone());
        let (capture, stop_rx) = CaptureHandle::new();

        spawn_pump(audio.clone(), Bytes::from_static(&OPUS_SILENCE), OPUS_FRAME, stop_rx.clone());
        spawn_pump(video.clone(), placeholder_frame(), VIDEO_FRAME, stop_rx);

        debug!("Synthetic camera stream {} started", stream_id);
        Ok(LocalStream::new(stream_id, audio, video, capture))
    }

    async fn get_display_media(&self) -> Result<DisplayStream, MediaError> {
        let stream_id = format!("screen-{}", Uuid::new_v4());
        let video = vp8_track("screen", stream_id.clone());
        let (capture, stop_rx) = CaptureHandle::new();
        let (ended_tx, ended_rx) = oneshot::channel();

        let pump_stop = stop_rx.clone();
        spawn_pump(video.clone(), placeholder_frame(), VIDEO_FRAME, pump_stop);
        // Synthetic screens never end on their own; the sender lives until
        // the capture is stopped so `ended` is dropped, not resolved.
        tokio::spawn(async move {
            let mut stop_rx = stop_rx;
            let _ = stop_rx.wait_for(|stopped| *stopped).await;
            drop(ended_tx);
        });

        debug!("Synthetic screen stream {} started", stream_id);
        Ok(DisplayStream::new(stream_id, video, capture, ended_rx))
    }
}

fn placeholder_frame() -> Bytes {
    // VP8 keyframe tag, start code and a 16x16 frame size.
    Bytes::from_static(&[
        0x50, 0x01, 0x00, 0x9d, 0x01, 0x2a, 0x10, 0x00, 0x10, 0x00,
    ])
}

fn spawn_pump(
    track: Arc<TrackLocalStaticSample>,
    payload: Bytes,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = Sample {
                        data: payload.clone(),
                        duration: interval,
                        ..Default::default()
                    };
                    if let Err(e) = track.write_sample(&sample).await {
                        debug!("Dropping synthetic sample on {}: {}", track.id(), e);
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });
}
