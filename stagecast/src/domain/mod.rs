//! Domain entities and state machines.

pub mod audio_mix;
pub mod broadcast;
pub mod camera;
pub mod recording;

pub use audio_mix::{AudioMixSession, BackgroundTrack, MixConfig, SoundEffect};
pub use broadcast::{BroadcastSession, BroadcastState};
pub use camera::CameraSource;
pub use recording::{RecordingSession, RecordingStatus};
