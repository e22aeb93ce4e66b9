//! Audio mix session entity and mix configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Volume buses for a mix, each clamped to `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixConfig {
    pub master_volume: u8,
    pub music_volume: u8,
    pub effects_volume: u8,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            master_volume: 100,
            music_volume: 100,
            effects_volume: 100,
        }
    }
}

impl MixConfig {
    pub const MAX_VOLUME: u8 = 100;

    /// Build a config with every bus clamped into range.
    pub fn clamped(master: i64, music: i64, effects: i64) -> Self {
        Self {
            master_volume: clamp_volume(master),
            music_volume: clamp_volume(music),
            effects_volume: clamp_volume(effects),
        }
    }

    /// Bus level as an ffmpeg volume factor.
    pub fn factor(volume: u8) -> f32 {
        f32::from(volume.min(Self::MAX_VOLUME)) / 100.0
    }
}

fn clamp_volume(v: i64) -> u8 {
    v.clamp(0, i64::from(MixConfig::MAX_VOLUME)) as u8
}

/// Looping background-music input state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundTrack {
    pub track_id: String,
    pub playing: bool,
    pub volume: u8,
    /// Playback position in seconds at the last state update.
    pub position_secs: f64,
}

impl BackgroundTrack {
    pub fn new(track_id: impl Into<String>, volume: i64) -> Self {
        Self {
            track_id: track_id.into(),
            playing: true,
            volume: clamp_volume(volume),
            position_secs: 0.0,
        }
    }
}

/// A transient sound-effect input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundEffect {
    pub effect_id: String,
    pub started_at: DateTime<Utc>,
    pub volume: u8,
}

impl SoundEffect {
    pub fn new(effect_id: impl Into<String>, volume: i64) -> Self {
        Self {
            effect_id: effect_id.into(),
            started_at: Utc::now(),
            volume: clamp_volume(volume),
        }
    }
}

/// Live mixing configuration and state for a broadcast.
///
/// Volumes are baked into the mixer subprocess at start time; mutating this
/// record does not change the audible output until the mixer restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMixSession {
    pub id: String,
    pub broadcast_id: String,
    pub is_active: bool,
    pub background_track: Option<BackgroundTrack>,
    pub effects: Vec<SoundEffect>,
    pub config: MixConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AudioMixSession {
    pub fn new(broadcast_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            broadcast_id: broadcast_id.into(),
            is_active: false,
            background_track: None,
            effects: Vec::new(),
            config: MixConfig::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_config(&mut self, config: MixConfig) {
        self.config = config;
        self.touch();
    }

    pub fn set_background_track(&mut self, track: Option<BackgroundTrack>) {
        self.background_track = track;
        self.touch();
    }

    pub fn add_effect(&mut self, effect: SoundEffect) {
        self.effects.push(effect);
        self.touch();
    }

    /// Remove an effect once its owning event completes or is cleared.
    pub fn clear_effect(&mut self, effect_id: &str) {
        self.effects.retain(|e| e.effect_id != effect_id);
        self.touch();
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.touch();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_config_clamps_out_of_range() {
        let config = MixConfig::clamped(150, -10, 55);
        assert_eq!(config.master_volume, 100);
        assert_eq!(config.music_volume, 0);
        assert_eq!(config.effects_volume, 55);
    }

    #[test]
    fn test_volume_factor() {
        assert_eq!(MixConfig::factor(100), 1.0);
        assert_eq!(MixConfig::factor(50), 0.5);
        assert_eq!(MixConfig::factor(0), 0.0);
    }

    #[test]
    fn test_background_track_volume_clamped() {
        let track = BackgroundTrack::new("track-1", 700);
        assert_eq!(track.volume, 100);
        assert!(track.playing);
    }

    #[test]
    fn test_effects_bookkeeping() {
        let mut mix = AudioMixSession::new("b1");
        mix.add_effect(SoundEffect::new("applause", 80));
        mix.add_effect(SoundEffect::new("airhorn", 60));
        assert_eq!(mix.effects.len(), 2);

        mix.clear_effect("applause");
        assert_eq!(mix.effects.len(), 1);
        assert_eq!(mix.effects[0].effect_id, "airhorn");
    }

    #[test]
    fn test_mutation_updates_timestamp() {
        let mut mix = AudioMixSession::new("b1");
        let created = mix.updated_at;
        mix.set_config(MixConfig::clamped(90, 90, 90));
        assert!(mix.updated_at >= created);
    }
}
