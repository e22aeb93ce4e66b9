//! Camera source repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::CameraSourceDbModel;
use crate::domain::CameraSource;
use crate::{Error, Result};

/// Camera repository trait.
#[async_trait]
pub trait CameraRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<CameraSource>;
    async fn list_for_broadcast(&self, broadcast_id: &str) -> Result<Vec<CameraSource>>;
    async fn get_active_for_broadcast(&self, broadcast_id: &str) -> Result<Option<CameraSource>>;
    async fn create(&self, camera: &CameraSource) -> Result<()>;
    /// Mark one camera active and every sibling inactive, atomically.
    async fn set_active(&self, broadcast_id: &str, camera_id: &str) -> Result<()>;
    /// Clear the active flag for a broadcast (composition falls back to the
    /// primary feed).
    async fn clear_active(&self, broadcast_id: &str) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// SQLx implementation of CameraRepository.
pub struct SqlxCameraRepository {
    pool: SqlitePool,
}

impl SqlxCameraRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CameraRepository for SqlxCameraRepository {
    async fn get(&self, id: &str) -> Result<CameraSource> {
        sqlx::query_as::<_, CameraSourceDbModel>("SELECT * FROM camera_sources WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("CameraSource", id))?
            .into_entity()
    }

    async fn list_for_broadcast(&self, broadcast_id: &str) -> Result<Vec<CameraSource>> {
        let rows = sqlx::query_as::<_, CameraSourceDbModel>(
            "SELECT * FROM camera_sources WHERE broadcast_id = ? ORDER BY created_at",
        )
        .bind(broadcast_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(CameraSourceDbModel::into_entity)
            .collect()
    }

    async fn get_active_for_broadcast(&self, broadcast_id: &str) -> Result<Option<CameraSource>> {
        let row = sqlx::query_as::<_, CameraSourceDbModel>(
            "SELECT * FROM camera_sources WHERE broadcast_id = ? AND is_active = 1 LIMIT 1",
        )
        .bind(broadcast_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CameraSourceDbModel::into_entity).transpose()
    }

    async fn create(&self, camera: &CameraSource) -> Result<()> {
        let model = CameraSourceDbModel::from_entity(camera);
        sqlx::query(
            r#"
            INSERT INTO camera_sources (id, broadcast_id, name, ingest_key, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.id)
        .bind(&model.broadcast_id)
        .bind(&model.name)
        .bind(&model.ingest_key)
        .bind(model.is_active)
        .bind(&model.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_active(&self, broadcast_id: &str, camera_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE camera_sources SET is_active = 0 WHERE broadcast_id = ?")
            .bind(broadcast_id)
            .execute(&mut *tx)
            .await?;

        let result =
            sqlx::query("UPDATE camera_sources SET is_active = 1 WHERE id = ? AND broadcast_id = ?")
                .bind(camera_id)
                .bind(broadcast_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::not_found("CameraSource", camera_id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear_active(&self, broadcast_id: &str) -> Result<()> {
        sqlx::query("UPDATE camera_sources SET is_active = 0 WHERE broadcast_id = ?")
            .bind(broadcast_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM camera_sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("CameraSource", id));
        }
        Ok(())
    }
}
