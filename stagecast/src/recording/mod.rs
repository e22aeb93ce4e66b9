//! Recording supervisor.
//!
//! Captures a broadcast's composited program feed to a raw FLV file with a
//! stream-copy ffmpeg subprocess. At most one recording runs per broadcast;
//! recording survives pauses and only stops when an operator stops it or the
//! broadcast ends.

use std::sync::Arc;

use process_supervisor::{Launcher, ProcessRegistry, ProcessSupervisor, SpawnSpec};
use tracing::{info, warn};

use crate::config::{AppConfig, path_arg};
use crate::database::repositories::RecordingRepository;
use crate::domain::RecordingSession;
use crate::notification::{BroadcastEvent, EventBroadcaster};
use crate::{Error, Result};

pub struct RecordingSupervisor {
    launcher: Arc<dyn Launcher>,
    registry: ProcessRegistry,
    repo: Arc<dyn RecordingRepository>,
    events: EventBroadcaster,
    config: Arc<AppConfig>,
}

impl RecordingSupervisor {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        repo: Arc<dyn RecordingRepository>,
        events: EventBroadcaster,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            launcher,
            registry: ProcessRegistry::new("recording"),
            repo,
            events,
            config,
        }
    }

    fn spawn_spec(&self, broadcast_id: &str, raw_path: &std::path::Path) -> SpawnSpec {
        // Stream copy: capture exactly what the composition engine emits.
        SpawnSpec::new(&self.config.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-i", &self.config.output_url(broadcast_id)])
            .args(["-c", "copy", "-f", "flv"])
            .arg(path_arg(raw_path))
            .env("LC_ALL", "C")
            .quit_command(b"q".to_vec())
    }

    /// Start capturing a broadcast. Fails with `AlreadyActive` when a
    /// recording is already running for it.
    pub async fn start(&self, broadcast_id: &str) -> Result<RecordingSession> {
        if self.registry.contains(broadcast_id) {
            return Err(Error::already_active("recording", broadcast_id));
        }
        if let Some(existing) = self.repo.get_active_for_broadcast(broadcast_id).await? {
            // A persisted active session with no process means a crash left
            // stale state behind; still refuse rather than silently fork.
            warn!(
                broadcast_id,
                recording_id = %existing.id,
                "active recording session on record but no process"
            );
            return Err(Error::already_active("recording", broadcast_id));
        }

        let mut recording = RecordingSession::new(broadcast_id, "");
        let raw_path = self.config.raw_recording_path(broadcast_id, &recording.id);
        recording.raw_path = Some(path_arg(&raw_path));

        if let Some(parent) = raw_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let spec = self.spawn_spec(broadcast_id, &raw_path);
        let child = self.launcher.launch(&spec).await?;
        let sup = ProcessSupervisor::new(child, spec.program.clone());

        if let Some(mut displaced) = self.registry.insert(broadcast_id.to_string(), sup) {
            warn!(broadcast_id, "displaced a concurrent recording process");
            let _ = displaced.stop(self.config.stop_grace).await;
        }

        if let Err(e) = self.repo.create(&recording).await {
            // No record, no process.
            let _ = self
                .registry
                .stop(broadcast_id, self.config.stop_grace)
                .await;
            return Err(e);
        }

        info!(broadcast_id, recording_id = %recording.id, path = %raw_path.display(), "recording started");
        self.events.publish(BroadcastEvent::RecordingStarted {
            broadcast_id: broadcast_id.to_string(),
            recording_id: recording.id.clone(),
            timestamp: recording.started_at,
        });
        Ok(recording)
    }

    /// Stop the broadcast's recording and mark the session completed.
    pub async fn stop(&self, broadcast_id: &str) -> Result<RecordingSession> {
        let Some(mut recording) = self.repo.get_active_for_broadcast(broadcast_id).await? else {
            return Err(Error::not_active("recording", broadcast_id));
        };

        self.registry
            .stop(broadcast_id, self.config.stop_grace)
            .await?;

        recording.complete();
        self.repo.update(&recording).await?;

        info!(broadcast_id, recording_id = %recording.id, "recording stopped");
        self.events.publish(BroadcastEvent::RecordingStopped {
            broadcast_id: broadcast_id.to_string(),
            recording_id: recording.id.clone(),
            timestamp: recording.stopped_at.unwrap_or_else(chrono::Utc::now),
        });
        Ok(recording)
    }

    /// Look up a recording session by id.
    pub async fn status(&self, recording_id: &str) -> Result<RecordingSession> {
        self.repo.get(recording_id).await
    }

    pub async fn list_for_broadcast(&self, broadcast_id: &str) -> Result<Vec<RecordingSession>> {
        self.repo.list_for_broadcast(broadcast_id).await
    }

    pub fn is_recording(&self, broadcast_id: &str) -> bool {
        self.registry.contains(broadcast_id)
    }

    pub fn active_broadcasts(&self) -> Vec<String> {
        self.registry.active_ids()
    }

    /// Reap capture processes that died on their own; their sessions are
    /// marked failed so the encode sweep skips them.
    pub async fn cleanup_finished(&self) -> Vec<String> {
        let mut cleaned = Vec::new();
        for (broadcast_id, exit) in self.registry.reap_finished() {
            warn!(
                broadcast_id = %broadcast_id,
                code = ?exit.code,
                "recording process exited on its own"
            );
            match self.repo.get_active_for_broadcast(&broadcast_id).await {
                Ok(Some(mut recording)) => {
                    if exit.success() {
                        // Clean exit still produced a usable file.
                        recording.complete();
                    } else {
                        recording.mark_failed();
                    }
                    if let Err(e) = self.repo.update(&recording).await {
                        warn!(broadcast_id = %broadcast_id, error = %e, "failed to finalize recording session");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(broadcast_id = %broadcast_id, error = %e, "failed to load recording session");
                }
            }
            cleaned.push(broadcast_id);
        }
        cleaned
    }

    /// Stop every capture process (shutdown path). Sessions stay `Recording`
    /// in the database; the next startup's sweep reconciles them.
    pub async fn stop_all(&self) -> usize {
        self.registry.stop_all(self.config.stop_grace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::database::repositories::{BroadcastRepository, SqlxBroadcastRepository, SqlxRecordingRepository};
    use crate::domain::{BroadcastSession, RecordingStatus};
    use crate::testing::FakeLauncher;

    async fn setup() -> (RecordingSupervisor, Arc<FakeLauncher>, String, tempfile::TempDir) {
        let pool = database::init_pool("sqlite::memory:").await.unwrap();
        database::run_migrations(&pool).await.unwrap();

        let broadcast = BroadcastSession::new("Launch");
        SqlxBroadcastRepository::new(pool.clone())
            .create(&broadcast)
            .await
            .unwrap();

        let media_root = tempfile::tempdir().unwrap();
        let config = AppConfig {
            media_root: media_root.path().to_path_buf(),
            ..AppConfig::default()
        };

        let launcher = Arc::new(FakeLauncher::new());
        let supervisor = RecordingSupervisor::new(
            launcher.clone(),
            Arc::new(SqlxRecordingRepository::new(pool)),
            EventBroadcaster::new(),
            Arc::new(config),
        );
        (supervisor, launcher, broadcast.id, media_root)
    }

    #[tokio::test]
    async fn test_start_spawns_and_persists() {
        let (supervisor, launcher, broadcast_id, _media) = setup().await;

        let recording = supervisor.start(&broadcast_id).await.unwrap();
        assert_eq!(recording.status, RecordingStatus::Recording);
        let raw_path = recording.raw_path.clone().unwrap();
        assert!(raw_path.ends_with(&format!("{}.flv", recording.id)));
        assert!(supervisor.is_recording(&broadcast_id));
        assert_eq!(launcher.spawn_count(), 1);

        let loaded = supervisor.status(&recording.id).await.unwrap();
        assert!(loaded.is_recording());
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let (supervisor, launcher, broadcast_id, _media) = setup().await;

        supervisor.start(&broadcast_id).await.unwrap();
        let err = supervisor.start(&broadcast_id).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyActive { .. }));
        assert_eq!(launcher.spawn_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_completes_session() {
        let (supervisor, _launcher, broadcast_id, _media) = setup().await;

        let recording = supervisor.start(&broadcast_id).await.unwrap();
        let stopped = supervisor.stop(&broadcast_id).await.unwrap();

        assert_eq!(stopped.id, recording.id);
        assert_eq!(stopped.status, RecordingStatus::Completed);
        assert!(stopped.stopped_at.is_some());
        assert!(!supervisor.is_recording(&broadcast_id));
    }

    #[tokio::test]
    async fn test_stop_without_recording_is_rejected() {
        let (supervisor, _launcher, broadcast_id, _media) = setup().await;

        let err = supervisor.stop(&broadcast_id).await.unwrap_err();
        assert!(matches!(err, Error::NotActive { .. }));
    }

    #[tokio::test]
    async fn test_stop_and_restart_creates_new_session() {
        let (supervisor, launcher, broadcast_id, _media) = setup().await;

        let first = supervisor.start(&broadcast_id).await.unwrap();
        supervisor.stop(&broadcast_id).await.unwrap();
        let second = supervisor.start(&broadcast_id).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(launcher.spawn_count(), 2);
    }

    #[tokio::test]
    async fn test_events_published() {
        let (supervisor, _launcher, broadcast_id, _media) = setup().await;
        let mut receiver = supervisor.events.subscribe();

        supervisor.start(&broadcast_id).await.unwrap();
        supervisor.stop(&broadcast_id).await.unwrap();

        assert!(matches!(
            receiver.try_recv().unwrap(),
            BroadcastEvent::RecordingStarted { .. }
        ));
        assert!(matches!(
            receiver.try_recv().unwrap(),
            BroadcastEvent::RecordingStopped { .. }
        ));
    }
}
