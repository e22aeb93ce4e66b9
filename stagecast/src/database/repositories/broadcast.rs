//! Broadcast repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::models::BroadcastDbModel;
use crate::domain::BroadcastSession;
use crate::{Error, Result};

/// Broadcast repository trait.
#[async_trait]
pub trait BroadcastRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<BroadcastSession>;
    /// Resolve an ingest key to its broadcast. Matches the broadcast's own
    /// key or any of its camera-source keys in a single read.
    async fn get_by_ingest_key(&self, ingest_key: &str) -> Result<BroadcastSession>;
    async fn list(&self) -> Result<Vec<BroadcastSession>>;
    async fn create(&self, broadcast: &BroadcastSession) -> Result<()>;
    async fn update(&self, broadcast: &BroadcastSession) -> Result<()>;
    /// Non-terminal broadcasts whose last ingest signal predates `cutoff`.
    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<BroadcastSession>>;
}

/// SQLx implementation of BroadcastRepository.
pub struct SqlxBroadcastRepository {
    pool: SqlitePool,
}

impl SqlxBroadcastRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BroadcastRepository for SqlxBroadcastRepository {
    async fn get(&self, id: &str) -> Result<BroadcastSession> {
        sqlx::query_as::<_, BroadcastDbModel>("SELECT * FROM broadcasts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Broadcast", id))?
            .into_entity()
    }

    async fn get_by_ingest_key(&self, ingest_key: &str) -> Result<BroadcastSession> {
        sqlx::query_as::<_, BroadcastDbModel>(
            r#"
            SELECT * FROM broadcasts
            WHERE ingest_key = ?
               OR id = (SELECT broadcast_id FROM camera_sources WHERE ingest_key = ?)
            LIMIT 1
            "#,
        )
        .bind(ingest_key)
        .bind(ingest_key)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Broadcast", format!("ingest_key={}", ingest_key)))?
        .into_entity()
    }

    async fn list(&self) -> Result<Vec<BroadcastSession>> {
        let rows =
            sqlx::query_as::<_, BroadcastDbModel>("SELECT * FROM broadcasts ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(BroadcastDbModel::into_entity).collect()
    }

    async fn create(&self, broadcast: &BroadcastSession) -> Result<()> {
        let model = BroadcastDbModel::from_entity(broadcast);
        sqlx::query(
            r#"
            INSERT INTO broadcasts
                (id, title, ingest_key, state, started_at, paused_at, ended_at, last_ingest_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.id)
        .bind(&model.title)
        .bind(&model.ingest_key)
        .bind(&model.state)
        .bind(&model.started_at)
        .bind(&model.paused_at)
        .bind(&model.ended_at)
        .bind(&model.last_ingest_at)
        .bind(&model.created_at)
        .bind(&model.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, broadcast: &BroadcastSession) -> Result<()> {
        let model = BroadcastDbModel::from_entity(broadcast);
        let result = sqlx::query(
            r#"
            UPDATE broadcasts SET
                title = ?,
                state = ?,
                started_at = ?,
                paused_at = ?,
                ended_at = ?,
                last_ingest_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&model.title)
        .bind(&model.state)
        .bind(&model.started_at)
        .bind(&model.paused_at)
        .bind(&model.ended_at)
        .bind(&model.last_ingest_at)
        .bind(&model.updated_at)
        .bind(&model.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Broadcast", &broadcast.id));
        }
        Ok(())
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<BroadcastSession>> {
        let rows = sqlx::query_as::<_, BroadcastDbModel>(
            r#"
            SELECT * FROM broadcasts
            WHERE state IN ('LIVE', 'PAUSED')
              AND (last_ingest_at IS NULL OR last_ingest_at < ?)
            "#,
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BroadcastDbModel::into_entity).collect()
    }
}
