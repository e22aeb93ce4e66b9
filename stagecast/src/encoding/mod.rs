//! Encoding pipeline.
//!
//! Transcodes a completed raw capture into a distributable MP4 and hands it
//! to the storage collaborator when one is configured. Encoding runs to
//! completion or a deadline; there is no mid-flight cancellation surface.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use process_supervisor::{Launcher, SpawnSpec};
use tracing::{info, warn};

use crate::config::{AppConfig, path_arg};
use crate::database::repositories::RecordingRepository;
use crate::domain::{RecordingSession, RecordingStatus};
use crate::notification::{BroadcastEvent, EventBroadcaster};
use crate::storage::StorageClient;
use crate::{Error, Result};

/// Concurrent transcodes during a pending sweep.
const MAX_CONCURRENT_ENCODES: usize = 2;

pub struct EncodingPipeline {
    launcher: Arc<dyn Launcher>,
    repo: Arc<dyn RecordingRepository>,
    storage: Option<Arc<dyn StorageClient>>,
    events: EventBroadcaster,
    config: Arc<AppConfig>,
}

impl EncodingPipeline {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        repo: Arc<dyn RecordingRepository>,
        storage: Option<Arc<dyn StorageClient>>,
        events: EventBroadcaster,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            launcher,
            repo,
            storage,
            events,
            config,
        }
    }

    fn spawn_spec(&self, raw_path: &str, encoded_path: &std::path::Path) -> SpawnSpec {
        SpawnSpec::new(&self.config.ffmpeg_path)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-i", raw_path])
            .args(["-c:v", "libx264"])
            .args(["-preset", &self.config.encode_preset])
            .args(["-crf", &self.config.encode_crf.to_string()])
            .args(["-c:a", "aac", "-b:a", "128k"])
            .args(["-movflags", "+faststart"])
            .arg(path_arg(encoded_path))
            .env("LC_ALL", "C")
    }

    /// Encode a completed recording and, when storage is configured, upload
    /// the result. Returns the updated session.
    pub async fn encode(&self, recording_id: &str) -> Result<RecordingSession> {
        let mut recording = self.repo.get(recording_id).await?;

        if recording.status != RecordingStatus::Completed {
            return Err(Error::validation(format!(
                "recording {} is {}, only completed recordings can be encoded",
                recording_id, recording.status
            )));
        }
        let Some(raw_path) = recording.raw_path.clone() else {
            return Err(Error::validation(format!(
                "recording {} has no raw capture file",
                recording_id
            )));
        };

        let encoded_path = self.config.encoded_path(&recording.id);
        if let Some(parent) = encoded_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(recording_id, raw = %raw_path, "encoding started");
        match self.run_encoder(&raw_path, &encoded_path).await {
            Ok(()) => {}
            Err(e) => {
                recording.mark_failed();
                self.repo.update(&recording).await?;
                self.events.publish(BroadcastEvent::EncodingFailed {
                    broadcast_id: recording.broadcast_id.clone(),
                    recording_id: recording.id.clone(),
                    message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                return Err(e);
            }
        }

        recording.encoded_path = Some(path_arg(&encoded_path));
        self.repo.update(&recording).await?;
        info!(recording_id, encoded = %encoded_path.display(), "encoding finished");

        let Some(storage) = &self.storage else {
            return Ok(recording);
        };

        // Upload failure leaves the session Completed with its encoded file
        // on disk; the pending sweep retries it later.
        let upload = storage.upload(&encoded_path).await?;
        recording.mark_uploaded(&upload.url);
        self.repo.update(&recording).await?;

        info!(recording_id, url = %upload.url, "recording uploaded");
        self.events.publish(BroadcastEvent::RecordingUploaded {
            broadcast_id: recording.broadcast_id.clone(),
            recording_id: recording.id.clone(),
            url: upload.url.clone(),
            timestamp: chrono::Utc::now(),
        });
        Ok(recording)
    }

    async fn run_encoder(&self, raw_path: &str, encoded_path: &std::path::Path) -> Result<()> {
        let spec = self.spawn_spec(raw_path, encoded_path);
        let mut child = self.launcher.launch(&spec).await?;

        let exit = match tokio::time::timeout(self.config.encode_timeout, child.wait()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(raw = raw_path, "encode deadline exceeded, killing encoder");
                child.kill().await?;
                let _ = child.wait().await;
                return Err(Error::subprocess(format!(
                    "encoder exceeded {}s deadline",
                    self.config.encode_timeout.as_secs()
                )));
            }
        };

        if !exit.success() {
            return Err(Error::subprocess(format!(
                "encoder exited with code {:?}",
                exit.code
            )));
        }
        Ok(())
    }

    /// Encode and upload every completed-but-not-uploaded recording.
    ///
    /// Startup and periodic sweep entry point; failures are logged per
    /// recording and never abort the batch.
    pub async fn encode_pending(&self) -> usize {
        let pending = match self.repo.list_by_status(RecordingStatus::Completed).await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "failed to list pending recordings");
                return 0;
            }
        };

        let candidates: Vec<_> = pending
            .into_iter()
            .filter(|r| r.upload_url.is_none())
            // Already encoded and nowhere to upload: nothing left to do.
            .filter(|r| !(r.encoded_path.is_some() && self.storage.is_none()))
            .collect();

        let results = stream::iter(candidates)
            .map(|recording| async move {
                let result = self.encode(&recording.id).await;
                (recording.id, result)
            })
            .buffer_unordered(MAX_CONCURRENT_ENCODES)
            .collect::<Vec<_>>()
            .await;

        let mut processed = 0;
        for (recording_id, result) in results {
            match result {
                Ok(_) => processed += 1,
                Err(e) => warn!(recording_id = %recording_id, error = %e, "pending encode failed"),
            }
        }
        processed
    }
}
