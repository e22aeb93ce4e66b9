//! API request/response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::domain::{
    AudioMixSession, BackgroundTrack, BroadcastSession, CameraSource, MixConfig, RecordingSession,
    SoundEffect,
};

// ---- Broadcasts ----

#[derive(Debug, Deserialize)]
pub struct CreateBroadcastRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub id: String,
    pub title: String,
    pub ingest_key: String,
    /// Where a source publishes to drive this broadcast.
    pub ingest_url: String,
    /// Where the composited program feed is republished.
    pub output_url: String,
    pub state: String,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_ingest_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BroadcastResponse {
    pub fn from_entity(broadcast: &BroadcastSession, config: &AppConfig) -> Self {
        Self {
            ingest_url: config.ingest_url(&broadcast.ingest_key),
            output_url: config.output_url(&broadcast.id),
            id: broadcast.id.clone(),
            title: broadcast.title.clone(),
            ingest_key: broadcast.ingest_key.clone(),
            state: broadcast.state.to_string(),
            started_at: broadcast.started_at,
            paused_at: broadcast.paused_at,
            ended_at: broadcast.ended_at,
            last_ingest_at: broadcast.last_ingest_at,
            created_at: broadcast.created_at,
            updated_at: broadcast.updated_at,
        }
    }
}

// ---- Cameras ----

#[derive(Debug, Deserialize)]
pub struct AddCameraRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CameraResponse {
    pub id: String,
    pub broadcast_id: String,
    pub name: String,
    pub ingest_key: String,
    pub ingest_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CameraResponse {
    pub fn from_entity(camera: &CameraSource, config: &AppConfig) -> Self {
        Self {
            ingest_url: config.ingest_url(&camera.ingest_key),
            id: camera.id.clone(),
            broadcast_id: camera.broadcast_id.clone(),
            name: camera.name.clone(),
            ingest_key: camera.ingest_key.clone(),
            is_active: camera.is_active,
            created_at: camera.created_at,
        }
    }
}

// ---- Recordings ----

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub id: String,
    pub broadcast_id: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub raw_path: Option<String>,
    pub encoded_path: Option<String>,
    pub upload_url: Option<String>,
}

impl RecordingResponse {
    pub fn from_entity(recording: &RecordingSession) -> Self {
        Self {
            id: recording.id.clone(),
            broadcast_id: recording.broadcast_id.clone(),
            status: recording.status.to_string(),
            started_at: recording.started_at,
            stopped_at: recording.stopped_at,
            raw_path: recording.raw_path.clone(),
            encoded_path: recording.encoded_path.clone(),
            upload_url: recording.upload_url.clone(),
        }
    }
}

// ---- Audio mix ----

#[derive(Debug, Deserialize)]
pub struct MixConfigRequest {
    pub master_volume: i64,
    pub music_volume: i64,
    pub effects_volume: i64,
}

impl MixConfigRequest {
    pub fn into_config(self) -> MixConfig {
        MixConfig::clamped(self.master_volume, self.music_volume, self.effects_volume)
    }
}

#[derive(Debug, Deserialize)]
pub struct BackgroundTrackRequest {
    pub track_id: String,
    #[serde(default = "default_volume")]
    pub volume: i64,
}

#[derive(Debug, Deserialize)]
pub struct SoundEffectRequest {
    pub effect_id: String,
    #[serde(default = "default_volume")]
    pub volume: i64,
}

fn default_volume() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct MixResponse {
    pub broadcast_id: String,
    /// Persisted intent: should a mixer be running.
    pub is_active: bool,
    /// Whether a mixer subprocess is running right now.
    pub running: bool,
    pub mix_output_url: String,
    pub config: MixConfig,
    pub background_track: Option<BackgroundTrack>,
    pub effects: Vec<SoundEffect>,
    pub updated_at: DateTime<Utc>,
}

impl MixResponse {
    pub fn from_entity(mix: &AudioMixSession, running: bool, config: &AppConfig) -> Self {
        Self {
            mix_output_url: config.mix_output_url(&mix.broadcast_id),
            broadcast_id: mix.broadcast_id.clone(),
            is_active: mix.is_active,
            running,
            config: mix.config,
            background_track: mix.background_track.clone(),
            effects: mix.effects.clone(),
            updated_at: mix.updated_at,
        }
    }
}

// ---- Ingest hooks ----

/// Acknowledgement returned to the ingest server.
#[derive(Debug, Serialize)]
pub struct HookResponse {
    pub status: String,
    pub broadcast_id: String,
    pub state: String,
}

// ---- Health ----

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub components: Vec<ComponentHealth>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_response_carries_urls() {
        let broadcast = BroadcastSession::new("Launch");
        let config = AppConfig::default();
        let response = BroadcastResponse::from_entity(&broadcast, &config);

        assert!(response.ingest_url.ends_with(&broadcast.ingest_key));
        assert!(response.output_url.ends_with(&broadcast.id));
        assert_eq!(response.state, "SCHEDULED");
    }

    #[test]
    fn test_mix_config_request_clamps() {
        let request = MixConfigRequest {
            master_volume: 300,
            music_volume: -20,
            effects_volume: 70,
        };
        let config = request.into_config();
        assert_eq!(config.master_volume, 100);
        assert_eq!(config.music_volume, 0);
        assert_eq!(config.effects_volume, 70);
    }

    #[test]
    fn test_effect_request_defaults_volume() {
        let request: SoundEffectRequest = serde_json::from_str(r#"{"effect_id":"applause"}"#).unwrap();
        assert_eq!(request.volume, 100);
    }
}
