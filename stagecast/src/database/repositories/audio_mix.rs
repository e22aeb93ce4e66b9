//! Audio mix session repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::AudioMixSessionDbModel;
use crate::domain::AudioMixSession;

/// Audio mix repository trait.
///
/// One row per broadcast; `upsert` keeps it that way.
#[async_trait]
pub trait AudioMixRepository: Send + Sync {
    async fn get_for_broadcast(&self, broadcast_id: &str) -> Result<Option<AudioMixSession>>;
    async fn list_active(&self) -> Result<Vec<AudioMixSession>>;
    async fn upsert(&self, mix: &AudioMixSession) -> Result<()>;
}

/// SQLx implementation of AudioMixRepository.
pub struct SqlxAudioMixRepository {
    pool: SqlitePool,
}

impl SqlxAudioMixRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AudioMixRepository for SqlxAudioMixRepository {
    async fn get_for_broadcast(&self, broadcast_id: &str) -> Result<Option<AudioMixSession>> {
        let row = sqlx::query_as::<_, AudioMixSessionDbModel>(
            "SELECT * FROM audio_mix_sessions WHERE broadcast_id = ?",
        )
        .bind(broadcast_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AudioMixSessionDbModel::into_entity).transpose()
    }

    async fn list_active(&self) -> Result<Vec<AudioMixSession>> {
        let rows = sqlx::query_as::<_, AudioMixSessionDbModel>(
            "SELECT * FROM audio_mix_sessions WHERE is_active = 1",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(AudioMixSessionDbModel::into_entity)
            .collect()
    }

    async fn upsert(&self, mix: &AudioMixSession) -> Result<()> {
        let model = AudioMixSessionDbModel::from_entity(mix)?;
        sqlx::query(
            r#"
            INSERT INTO audio_mix_sessions
                (id, broadcast_id, is_active, mix_state, master_volume, music_volume, effects_volume, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(broadcast_id) DO UPDATE SET
                is_active = excluded.is_active,
                mix_state = excluded.mix_state,
                master_volume = excluded.master_volume,
                music_volume = excluded.music_volume,
                effects_volume = excluded.effects_volume,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&model.id)
        .bind(&model.broadcast_id)
        .bind(model.is_active)
        .bind(&model.mix_state)
        .bind(model.master_volume)
        .bind(model.music_volume)
        .bind(model.effects_volume)
        .bind(&model.created_at)
        .bind(&model.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::database::repositories::broadcast::{BroadcastRepository, SqlxBroadcastRepository};
    use crate::domain::{BroadcastSession, MixConfig, SoundEffect};

    async fn setup() -> (SqlxAudioMixRepository, String) {
        let pool = database::init_pool("sqlite::memory:").await.unwrap();
        database::run_migrations(&pool).await.unwrap();

        let broadcast = BroadcastSession::new("Launch");
        SqlxBroadcastRepository::new(pool.clone())
            .create(&broadcast)
            .await
            .unwrap();

        (SqlxAudioMixRepository::new(pool), broadcast.id)
    }

    #[tokio::test]
    async fn test_upsert_is_single_row_per_broadcast() {
        let (repo, broadcast_id) = setup().await;

        let mut mix = AudioMixSession::new(&broadcast_id);
        mix.activate();
        repo.upsert(&mix).await.unwrap();

        mix.set_config(MixConfig::clamped(80, 50, 60));
        mix.add_effect(SoundEffect::new("applause", 90));
        repo.upsert(&mix).await.unwrap();

        let loaded = repo.get_for_broadcast(&broadcast_id).await.unwrap().unwrap();
        assert_eq!(loaded.config.master_volume, 80);
        assert_eq!(loaded.effects.len(), 1);

        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_deactivated_mix_is_not_listed_active() {
        let (repo, broadcast_id) = setup().await;

        let mut mix = AudioMixSession::new(&broadcast_id);
        mix.activate();
        repo.upsert(&mix).await.unwrap();

        mix.deactivate();
        repo.upsert(&mix).await.unwrap();

        assert!(repo.list_active().await.unwrap().is_empty());
    }
}
