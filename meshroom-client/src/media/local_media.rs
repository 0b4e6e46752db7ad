use crate::media::local_stream::{DisplayStream, LocalStream, LocalTrack};
use crate::media::media_devices::MediaDevices;
use std::sync::Arc;
use tracing::info;

/// Session-owned capture state: the camera stream acquired once per session
/// and, while screen sharing, the display stream that replaces its video.
pub struct LocalMediaSource {
    devices: Arc<dyn MediaDevices>,
    camera: Option<LocalStream>,
    display: Option<DisplayStream>,
}

impl LocalMediaSource {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            camera: None,
            display: None,
        }
    }

    pub fn devices(&self) -> Arc<dyn MediaDevices> {
        self.devices.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.camera.is_some()
    }

    pub fn is_sharing(&self) -> bool {
        self.display.is_some()
    }

    pub fn camera(&self) -> Option<&LocalStream> {
        self.camera.as_ref()
    }

    pub fn display_id(&self) -> Option<&str> {
        self.display.as_ref().map(|d| d.id.as_str())
    }

    pub fn camera_video(&self) -> Option<LocalTrack> {
        self.camera.as_ref().map(|c| c.video.clone())
    }

    /// Audio plus whatever video currently goes out: the screen while
    /// sharing, the camera otherwise.
    pub fn outbound_tracks(&self) -> Option<(LocalTrack, LocalTrack)> {
        let camera = self.camera.as_ref()?;
        let video = match &self.display {
            Some(display) => display.video.clone(),
            None => camera.video.clone(),
        };
        Some((camera.audio.clone(), video))
    }

    pub fn install_camera(&mut self, stream: LocalStream) {
        if let Some(previous) = self.camera.replace(stream) {
            previous.stop();
        }
    }

    pub fn install_display(&mut self, display: DisplayStream) {
        if let Some(previous) = self.display.replace(display) {
            previous.stop();
        }
    }

    pub fn take_display(&mut self) -> Option<DisplayStream> {
        self.display.take()
    }

    pub fn stop_all(&mut self) {
        if let Some(display) = self.display.take() {
            display.stop();
        }
        if let Some(camera) = self.camera.take() {
            info!("Stopping local capture {}", camera.id);
            camera.stop();
        }
    }
}
