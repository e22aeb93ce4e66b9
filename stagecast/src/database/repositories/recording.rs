//! Recording session repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::RecordingSessionDbModel;
use crate::domain::{RecordingSession, RecordingStatus};
use crate::{Error, Result};

/// Recording repository trait.
#[async_trait]
pub trait RecordingRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<RecordingSession>;
    /// The at-most-one session with status `Recording` for a broadcast.
    async fn get_active_for_broadcast(&self, broadcast_id: &str) -> Result<Option<RecordingSession>>;
    async fn list_for_broadcast(&self, broadcast_id: &str) -> Result<Vec<RecordingSession>>;
    async fn list_by_status(&self, status: RecordingStatus) -> Result<Vec<RecordingSession>>;
    async fn create(&self, recording: &RecordingSession) -> Result<()>;
    async fn update(&self, recording: &RecordingSession) -> Result<()>;
}

/// SQLx implementation of RecordingRepository.
pub struct SqlxRecordingRepository {
    pool: SqlitePool,
}

impl SqlxRecordingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordingRepository for SqlxRecordingRepository {
    async fn get(&self, id: &str) -> Result<RecordingSession> {
        sqlx::query_as::<_, RecordingSessionDbModel>("SELECT * FROM recording_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("RecordingSession", id))?
            .into_entity()
    }

    async fn get_active_for_broadcast(&self, broadcast_id: &str) -> Result<Option<RecordingSession>> {
        let row = sqlx::query_as::<_, RecordingSessionDbModel>(
            r#"
            SELECT * FROM recording_sessions
            WHERE broadcast_id = ? AND status = 'RECORDING'
            ORDER BY started_at DESC LIMIT 1
            "#,
        )
        .bind(broadcast_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(RecordingSessionDbModel::into_entity).transpose()
    }

    async fn list_for_broadcast(&self, broadcast_id: &str) -> Result<Vec<RecordingSession>> {
        let rows = sqlx::query_as::<_, RecordingSessionDbModel>(
            "SELECT * FROM recording_sessions WHERE broadcast_id = ? ORDER BY started_at DESC",
        )
        .bind(broadcast_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(RecordingSessionDbModel::into_entity)
            .collect()
    }

    async fn list_by_status(&self, status: RecordingStatus) -> Result<Vec<RecordingSession>> {
        let rows = sqlx::query_as::<_, RecordingSessionDbModel>(
            "SELECT * FROM recording_sessions WHERE status = ? ORDER BY started_at",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(RecordingSessionDbModel::into_entity)
            .collect()
    }

    async fn create(&self, recording: &RecordingSession) -> Result<()> {
        let model = RecordingSessionDbModel::from_entity(recording);
        sqlx::query(
            r#"
            INSERT INTO recording_sessions
                (id, broadcast_id, status, started_at, stopped_at, raw_path, encoded_path, upload_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.id)
        .bind(&model.broadcast_id)
        .bind(&model.status)
        .bind(&model.started_at)
        .bind(&model.stopped_at)
        .bind(&model.raw_path)
        .bind(&model.encoded_path)
        .bind(&model.upload_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, recording: &RecordingSession) -> Result<()> {
        let model = RecordingSessionDbModel::from_entity(recording);
        let result = sqlx::query(
            r#"
            UPDATE recording_sessions SET
                status = ?,
                stopped_at = ?,
                raw_path = ?,
                encoded_path = ?,
                upload_url = ?
            WHERE id = ?
            "#,
        )
        .bind(&model.status)
        .bind(&model.stopped_at)
        .bind(&model.raw_path)
        .bind(&model.encoded_path)
        .bind(&model.upload_url)
        .bind(&model.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("RecordingSession", &recording.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::database::repositories::broadcast::{BroadcastRepository, SqlxBroadcastRepository};
    use crate::domain::BroadcastSession;

    async fn setup() -> (SqlxRecordingRepository, String) {
        let pool = database::init_pool("sqlite::memory:").await.unwrap();
        database::run_migrations(&pool).await.unwrap();

        let broadcast = BroadcastSession::new("Launch");
        SqlxBroadcastRepository::new(pool.clone())
            .create(&broadcast)
            .await
            .unwrap();

        (SqlxRecordingRepository::new(pool), broadcast.id)
    }

    #[tokio::test]
    async fn test_active_session_lookup() {
        let (repo, broadcast_id) = setup().await;

        assert!(
            repo.get_active_for_broadcast(&broadcast_id)
                .await
                .unwrap()
                .is_none()
        );

        let recording = RecordingSession::new(&broadcast_id, "/media/raw.flv");
        repo.create(&recording).await.unwrap();

        let active = repo.get_active_for_broadcast(&broadcast_id).await.unwrap();
        assert_eq!(active.unwrap().id, recording.id);
    }

    #[tokio::test]
    async fn test_completed_session_is_not_active() {
        let (repo, broadcast_id) = setup().await;

        let mut recording = RecordingSession::new(&broadcast_id, "/media/raw.flv");
        repo.create(&recording).await.unwrap();

        recording.complete();
        repo.update(&recording).await.unwrap();

        assert!(
            repo.get_active_for_broadcast(&broadcast_id)
                .await
                .unwrap()
                .is_none()
        );

        let completed = repo.list_by_status(RecordingStatus::Completed).await.unwrap();
        assert_eq!(completed.len(), 1);
    }

    #[tokio::test]
    async fn test_update_persists_upload() {
        let (repo, broadcast_id) = setup().await;

        let mut recording = RecordingSession::new(&broadcast_id, "/media/raw.flv");
        repo.create(&recording).await.unwrap();

        recording.complete();
        recording.encoded_path = Some("/media/out.mp4".to_string());
        recording.mark_uploaded("https://cdn.example.com/out.mp4");
        repo.update(&recording).await.unwrap();

        let loaded = repo.get(&recording.id).await.unwrap();
        assert_eq!(loaded.status, RecordingStatus::Uploaded);
        assert_eq!(
            loaded.upload_url.as_deref(),
            Some("https://cdn.example.com/out.mp4")
        );
    }
}
