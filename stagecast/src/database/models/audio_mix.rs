//! Audio mix session database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::parse_ts;
use crate::Result;
use crate::domain::{AudioMixSession, BackgroundTrack, MixConfig, SoundEffect};

/// JSON payload stored in the `mix_state` column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MixStateJson {
    #[serde(default)]
    background_track: Option<BackgroundTrack>,
    #[serde(default)]
    effects: Vec<SoundEffect>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AudioMixSessionDbModel {
    pub id: String,
    pub broadcast_id: String,
    pub is_active: i64,
    pub mix_state: String,
    pub master_volume: i64,
    pub music_volume: i64,
    pub effects_volume: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl AudioMixSessionDbModel {
    pub fn from_entity(entity: &AudioMixSession) -> Result<Self> {
        let state = MixStateJson {
            background_track: entity.background_track.clone(),
            effects: entity.effects.clone(),
        };
        Ok(Self {
            id: entity.id.clone(),
            broadcast_id: entity.broadcast_id.clone(),
            is_active: i64::from(entity.is_active),
            mix_state: serde_json::to_string(&state)?,
            master_volume: i64::from(entity.config.master_volume),
            music_volume: i64::from(entity.config.music_volume),
            effects_volume: i64::from(entity.config.effects_volume),
            created_at: entity.created_at.to_rfc3339(),
            updated_at: entity.updated_at.to_rfc3339(),
        })
    }

    pub fn into_entity(self) -> Result<AudioMixSession> {
        let state: MixStateJson = serde_json::from_str(&self.mix_state)?;
        Ok(AudioMixSession {
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            is_active: self.is_active != 0,
            background_track: state.background_track,
            effects: state.effects,
            // Volumes were clamped on the way in; clamp again on the way out
            // in case the row was edited externally.
            config: MixConfig::clamped(self.master_volume, self.music_volume, self.effects_volume),
            id: self.id,
            broadcast_id: self.broadcast_id,
        })
    }
}
