//! Composition engine.
//!
//! Republishes the currently active source's feed as the broadcast's single
//! composited output via a stream-copy ffmpeg subprocess. Switching sources
//! is stop-then-start with a short settle delay; the brief output gap is the
//! accepted trade-off for a single-decoder design.

use std::sync::Arc;

use process_supervisor::{Launcher, ProcessRegistry, ProcessSupervisor, SpawnSpec, StopOutcome};
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::AppConfig;
use crate::domain::{BroadcastSession, CameraSource};

/// The feed the composition engine reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionSource {
    pub name: String,
    pub ingest_key: String,
}

impl CompositionSource {
    /// A broadcast's primary ingest feed.
    pub fn primary(broadcast: &BroadcastSession) -> Self {
        Self {
            name: "primary".to_string(),
            ingest_key: broadcast.ingest_key.clone(),
        }
    }

    pub fn camera(camera: &CameraSource) -> Self {
        Self {
            name: camera.name.clone(),
            ingest_key: camera.ingest_key.clone(),
        }
    }
}

/// Supervises one republishing subprocess per broadcast.
pub struct CompositionEngine {
    launcher: Arc<dyn Launcher>,
    registry: ProcessRegistry,
    config: Arc<AppConfig>,
}

impl CompositionEngine {
    pub fn new(launcher: Arc<dyn Launcher>, config: Arc<AppConfig>) -> Self {
        Self {
            launcher,
            registry: ProcessRegistry::new("composition"),
            config,
        }
    }

    fn spawn_spec(&self, broadcast_id: &str, source: &CompositionSource) -> SpawnSpec {
        // Stream copy keeps switch latency down; no re-encoding.
        SpawnSpec::new(&self.config.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-i", &self.config.ingest_url(&source.ingest_key)])
            .args(["-c", "copy", "-f", "flv"])
            .arg(self.config.output_url(broadcast_id))
            .env("LC_ALL", "C")
            .quit_command(b"q".to_vec())
    }

    /// Start composing for a broadcast. Idempotent: an already-running
    /// process for this broadcast is stopped first, never duplicated.
    pub async fn start(&self, broadcast_id: &str, source: &CompositionSource) -> Result<()> {
        if self.registry.contains(broadcast_id) {
            debug!(broadcast_id, "composition already running, restarting");
            self.registry
                .stop(broadcast_id, self.config.stop_grace)
                .await?;
        }

        let spec = self.spawn_spec(broadcast_id, source);
        let child = self.launcher.launch(&spec).await?;
        let sup = ProcessSupervisor::new(child, spec.program.clone());

        if let Some(mut displaced) = self.registry.insert(broadcast_id.to_string(), sup) {
            // Registry invariant: one process per broadcast.
            warn!(broadcast_id, "displaced a concurrent composition process");
            let _ = displaced.stop(self.config.stop_grace).await;
        }

        info!(broadcast_id, source = %source.name, "composition started");
        Ok(())
    }

    /// Switch the broadcast's composited output to a new source.
    pub async fn switch(&self, broadcast_id: &str, source: &CompositionSource) -> Result<()> {
        self.registry
            .stop(broadcast_id, self.config.stop_grace)
            .await?;

        // Settle before reopening the output path to avoid file-handle
        // contention with the outgoing process.
        tokio::time::sleep(self.config.settle_delay).await;

        self.start(broadcast_id, source).await?;
        info!(broadcast_id, source = %source.name, "composition switched");
        Ok(())
    }

    /// Stop the composition process, if any.
    pub async fn stop(&self, broadcast_id: &str) -> Result<Option<StopOutcome>> {
        let outcome = self
            .registry
            .stop(broadcast_id, self.config.stop_grace)
            .await?;
        if outcome.is_some() {
            info!(broadcast_id, "composition stopped");
        }
        Ok(outcome)
    }

    pub fn is_running(&self, broadcast_id: &str) -> bool {
        self.registry.contains(broadcast_id)
    }

    pub fn active_broadcasts(&self) -> Vec<String> {
        self.registry.active_ids()
    }

    /// Drop registry entries whose process died on its own. A broadcast can
    /// be live with no composition process; that is observable, not fatal.
    pub fn cleanup_finished(&self) -> Vec<String> {
        self.registry
            .reap_finished()
            .into_iter()
            .map(|(id, exit)| {
                warn!(broadcast_id = %id, code = ?exit.code, "composition process exited on its own");
                id
            })
            .collect()
    }

    /// Stop every composition process (shutdown path).
    pub async fn stop_all(&self) -> usize {
        self.registry.stop_all(self.config.stop_grace).await
    }
}
