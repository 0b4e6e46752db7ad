mod local_media;
mod local_stream;
mod media_devices;

pub use local_media::LocalMediaSource;
pub use local_stream::{
    CaptureHandle, DisplayStream, LocalStream, LocalTrack, RemoteMediaStream, RemoteTrack,
    TrackKind, opus_track, vp8_track,
};
pub use media_devices::{MediaDevices, SyntheticMediaDevices};
