//! Repositories.

pub mod audio_mix;
pub mod broadcast;
pub mod camera;
pub mod recording;

pub use audio_mix::{AudioMixRepository, SqlxAudioMixRepository};
pub use broadcast::{BroadcastRepository, SqlxBroadcastRepository};
pub use camera::{CameraRepository, SqlxCameraRepository};
pub use recording::{RecordingRepository, SqlxRecordingRepository};
