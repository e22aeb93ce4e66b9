//! Broadcast orchestrator.
//!
//! The single writer for broadcast lifecycle state. Ingest webhook events
//! and operator commands both land here; a per-broadcast async lock
//! serializes them so concurrent events against one broadcast apply in
//! some order, never interleaved.
//!
//! Persisted state is the source of truth. Subprocess failures during a
//! transition are logged and surfaced, but the state change that triggered
//! them still commits; a live broadcast with a dead composition process is
//! an observable condition, not a rollback.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::composition::{CompositionEngine, CompositionSource};
use crate::config::AppConfig;
use crate::database::repositories::{BroadcastRepository, CameraRepository};
use crate::domain::{BroadcastSession, CameraSource, RecordingSession};
use crate::encoding::EncodingPipeline;
use crate::ingest::IngestEvent;
use crate::mixer::AudioMixer;
use crate::notification::{BroadcastEvent, EventBroadcaster};
use crate::recording::RecordingSupervisor;
use crate::thumbnail::ThumbnailSampler;
use crate::{Error, Result};

pub struct BroadcastOrchestrator {
    broadcasts: Arc<dyn BroadcastRepository>,
    cameras: Arc<dyn CameraRepository>,
    pub recording: Arc<RecordingSupervisor>,
    pub encoding: Arc<EncodingPipeline>,
    pub composition: Arc<CompositionEngine>,
    pub mixer: Arc<AudioMixer>,
    thumbnails: Arc<ThumbnailSampler>,
    events: EventBroadcaster,
    /// Per-broadcast serialization of state transitions.
    locks: DashMap<String, Arc<Mutex<()>>>,
    config: Arc<AppConfig>,
}

impl BroadcastOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broadcasts: Arc<dyn BroadcastRepository>,
        cameras: Arc<dyn CameraRepository>,
        recording: Arc<RecordingSupervisor>,
        encoding: Arc<EncodingPipeline>,
        composition: Arc<CompositionEngine>,
        mixer: Arc<AudioMixer>,
        thumbnails: Arc<ThumbnailSampler>,
        events: EventBroadcaster,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            broadcasts,
            cameras,
            recording,
            encoding,
            composition,
            mixer,
            thumbnails,
            events,
            locks: DashMap::new(),
            config,
        }
    }

    fn lock_for(&self, broadcast_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(broadcast_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    // ---- Broadcast CRUD ----

    pub async fn create_broadcast(&self, title: &str) -> Result<BroadcastSession> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation("broadcast title must not be empty"));
        }
        let broadcast = BroadcastSession::new(title);
        self.broadcasts.create(&broadcast).await?;
        info!(broadcast_id = %broadcast.id, title, "broadcast created");
        Ok(broadcast)
    }

    pub async fn get_broadcast(&self, broadcast_id: &str) -> Result<BroadcastSession> {
        self.broadcasts.get(broadcast_id).await
    }

    pub async fn list_broadcasts(&self) -> Result<Vec<BroadcastSession>> {
        self.broadcasts.list().await
    }

    // ---- Ingest events ----

    /// Apply a parsed ingest event.
    ///
    /// The key resolves to a broadcast directly or through one of its
    /// cameras; either way the event drives the owning broadcast's state.
    /// Events against an `Ended` broadcast are acknowledged no-ops: the
    /// ingest server retries on error responses, and a terminal broadcast
    /// has nothing left to retry into.
    pub async fn handle_ingest_event(&self, event: IngestEvent) -> Result<BroadcastSession> {
        let resolved = self.broadcasts.get_by_ingest_key(event.ingest_key()).await?;

        let lock = self.lock_for(&resolved.id);
        let _guard = lock.lock().await;

        // Re-read under the lock; the resolve read raced other writers.
        let mut broadcast = self.broadcasts.get(&resolved.id).await?;

        match &event {
            IngestEvent::SourceStart { .. } => {
                if broadcast.state.is_terminal() {
                    debug!(broadcast_id = %broadcast.id, "ignoring source start for ended broadcast");
                    self.locks.remove(&broadcast.id);
                    return Ok(broadcast);
                }
                let first_live = broadcast.go_live()?;
                broadcast.mark_ingest_seen();
                self.broadcasts.update(&broadcast).await?;

                if first_live {
                    // Recording trouble must not keep the broadcast off air.
                    if let Err(e) = self.recording.start(&broadcast.id).await {
                        warn!(broadcast_id = %broadcast.id, error = %e, "failed to start recording");
                    }
                }

                self.ensure_composition(&broadcast).await;
                self.ensure_mixer(&broadcast).await;
                self.thumbnails.sample_detached(&broadcast.id);

                info!(broadcast_id = %broadcast.id, first_live, "broadcast live");
                self.events.publish(BroadcastEvent::BroadcastLive {
                    broadcast_id: broadcast.id.clone(),
                    timestamp: Utc::now(),
                });
            }
            IngestEvent::SourceStop { .. } => {
                if broadcast.state.is_terminal() {
                    debug!(broadcast_id = %broadcast.id, "ignoring source stop for ended broadcast");
                    self.locks.remove(&broadcast.id);
                    return Ok(broadcast);
                }
                broadcast.pause()?;
                broadcast.mark_ingest_seen();
                self.broadcasts.update(&broadcast).await?;

                // Recording and composition keep running: a pause is a
                // source interruption, not a teardown.
                info!(broadcast_id = %broadcast.id, "broadcast paused");
                self.events.publish(BroadcastEvent::BroadcastPaused {
                    broadcast_id: broadcast.id.clone(),
                    timestamp: Utc::now(),
                });
            }
        }

        Ok(broadcast)
    }

    /// (Re)start composition from the active camera, or the primary feed
    /// when none is active.
    async fn ensure_composition(&self, broadcast: &BroadcastSession) {
        let source = match self.cameras.get_active_for_broadcast(&broadcast.id).await {
            Ok(Some(camera)) => CompositionSource::camera(&camera),
            Ok(None) => CompositionSource::primary(broadcast),
            Err(e) => {
                warn!(broadcast_id = %broadcast.id, error = %e, "failed to resolve active camera");
                CompositionSource::primary(broadcast)
            }
        };

        if self.composition.is_running(&broadcast.id) {
            return;
        }
        if let Err(e) = self.composition.start(&broadcast.id, &source).await {
            warn!(broadcast_id = %broadcast.id, error = %e, "failed to start composition");
        }
    }

    /// Restart the mixer only when a persisted active mix session says one
    /// should be running (e.g. after a source interruption).
    async fn ensure_mixer(&self, broadcast: &BroadcastSession) {
        if self.mixer.is_running(&broadcast.id) {
            return;
        }
        match self.mixer.get(&broadcast.id).await {
            Ok(mix) if mix.is_active => {
                if let Err(e) = self.mixer.start(&broadcast.id).await {
                    warn!(broadcast_id = %broadcast.id, error = %e, "failed to restart mixer");
                }
            }
            Ok(_) | Err(Error::NotFound { .. }) => {}
            Err(e) => {
                warn!(broadcast_id = %broadcast.id, error = %e, "failed to load mix session");
            }
        }
    }

    // ---- Operator commands ----

    /// End a broadcast: terminal state, full teardown, encode kick-off.
    pub async fn end_broadcast(&self, broadcast_id: &str) -> Result<BroadcastSession> {
        let lock = self.lock_for(broadcast_id);
        let _guard = lock.lock().await;

        let mut broadcast = self.broadcasts.get(broadcast_id).await?;
        broadcast.end()?;
        self.broadcasts.update(&broadcast).await?;

        if let Err(e) = self.composition.stop(broadcast_id).await {
            warn!(broadcast_id, error = %e, "failed to stop composition");
        }
        if let Err(e) = self.mixer.stop(broadcast_id).await {
            warn!(broadcast_id, error = %e, "failed to stop mixer");
        }

        match self.recording.stop(broadcast_id).await {
            Ok(recording) => self.spawn_encode(recording),
            Err(Error::NotActive { .. }) => {}
            Err(e) => warn!(broadcast_id, error = %e, "failed to stop recording"),
        }

        info!(broadcast_id, "broadcast ended");
        self.events.publish(BroadcastEvent::BroadcastEnded {
            broadcast_id: broadcast_id.to_string(),
            timestamp: Utc::now(),
        });

        // Terminal: nothing left to serialize, so the lock entry can go.
        // A racing caller gets a fresh lock and then sees the Ended state.
        self.locks.remove(broadcast_id);
        Ok(broadcast)
    }

    /// Run the encode off the command path; ending a broadcast must not
    /// block on a transcode.
    fn spawn_encode(&self, recording: RecordingSession) {
        let encoding = Arc::clone(&self.encoding);
        tokio::spawn(async move {
            if let Err(e) = encoding.encode(&recording.id).await {
                warn!(recording_id = %recording.id, error = %e, "post-broadcast encode failed");
            }
        });
    }

    /// Start recording on operator demand (outside the first-live path).
    pub async fn start_recording(&self, broadcast_id: &str) -> Result<RecordingSession> {
        let lock = self.lock_for(broadcast_id);
        let _guard = lock.lock().await;

        let broadcast = self.broadcasts.get(broadcast_id).await?;
        if broadcast.state.is_terminal() {
            return Err(Error::invalid_transition("ENDED", "recording"));
        }
        self.recording.start(broadcast_id).await
    }

    /// Stop recording on operator demand; the encode runs detached.
    pub async fn stop_recording(&self, broadcast_id: &str) -> Result<RecordingSession> {
        let lock = self.lock_for(broadcast_id);
        let _guard = lock.lock().await;

        self.broadcasts.get(broadcast_id).await?;
        let recording = self.recording.stop(broadcast_id).await?;
        self.spawn_encode(recording.clone());
        Ok(recording)
    }

    pub async fn list_recordings(&self, broadcast_id: &str) -> Result<Vec<RecordingSession>> {
        self.broadcasts.get(broadcast_id).await?;
        self.recording.list_for_broadcast(broadcast_id).await
    }

    // ---- Audio mix ----

    pub async fn start_mix(&self, broadcast_id: &str) -> Result<crate::domain::AudioMixSession> {
        let lock = self.lock_for(broadcast_id);
        let _guard = lock.lock().await;

        let broadcast = self.broadcasts.get(broadcast_id).await?;
        if broadcast.state.is_terminal() {
            return Err(Error::invalid_transition("ENDED", "mix start"));
        }
        self.mixer.start(broadcast_id).await
    }

    pub async fn stop_mix(&self, broadcast_id: &str) -> Result<()> {
        let lock = self.lock_for(broadcast_id);
        let _guard = lock.lock().await;

        self.broadcasts.get(broadcast_id).await?;
        self.mixer.stop(broadcast_id).await?;
        Ok(())
    }

    // Mix mutations are persist-only, but they still verify the broadcast
    // exists so an unknown id surfaces as NotFound rather than a foreign
    // key violation.

    pub async fn update_mix_config(
        &self,
        broadcast_id: &str,
        config: crate::domain::MixConfig,
    ) -> Result<crate::domain::AudioMixSession> {
        self.broadcasts.get(broadcast_id).await?;
        self.mixer.update_config(broadcast_id, config).await
    }

    pub async fn set_mix_track(
        &self,
        broadcast_id: &str,
        track: Option<crate::domain::BackgroundTrack>,
    ) -> Result<crate::domain::AudioMixSession> {
        self.broadcasts.get(broadcast_id).await?;
        self.mixer.set_background_track(broadcast_id, track).await
    }

    pub async fn add_mix_effect(
        &self,
        broadcast_id: &str,
        effect: crate::domain::SoundEffect,
    ) -> Result<crate::domain::AudioMixSession> {
        self.broadcasts.get(broadcast_id).await?;
        self.mixer.add_effect(broadcast_id, effect).await
    }

    pub async fn clear_mix_effect(
        &self,
        broadcast_id: &str,
        effect_id: &str,
    ) -> Result<crate::domain::AudioMixSession> {
        self.broadcasts.get(broadcast_id).await?;
        self.mixer.clear_effect(broadcast_id, effect_id).await
    }

    // ---- Cameras ----

    pub async fn add_camera(&self, broadcast_id: &str, name: &str) -> Result<CameraSource> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("camera name must not be empty"));
        }
        let broadcast = self.broadcasts.get(broadcast_id).await?;
        if broadcast.state.is_terminal() {
            return Err(Error::invalid_transition("ENDED", "camera add"));
        }

        let camera = CameraSource::new(broadcast_id, name);
        self.cameras.create(&camera).await?;
        info!(broadcast_id, camera_id = %camera.id, name, "camera added");
        Ok(camera)
    }

    pub async fn list_cameras(&self, broadcast_id: &str) -> Result<Vec<CameraSource>> {
        self.broadcasts.get(broadcast_id).await?;
        self.cameras.list_for_broadcast(broadcast_id).await
    }

    /// Switch the composited output to a camera's feed.
    pub async fn switch_camera(&self, broadcast_id: &str, camera_id: &str) -> Result<CameraSource> {
        let lock = self.lock_for(broadcast_id);
        let _guard = lock.lock().await;

        let broadcast = self.broadcasts.get(broadcast_id).await?;
        if broadcast.state.is_terminal() {
            return Err(Error::invalid_transition("ENDED", "camera switch"));
        }

        let camera = self.cameras.get(camera_id).await?;
        if camera.broadcast_id != broadcast_id {
            return Err(Error::not_found("CameraSource", camera_id));
        }

        self.cameras.set_active(broadcast_id, camera_id).await?;
        // Re-read so the returned row carries the activation.
        let camera = self.cameras.get(camera_id).await?;

        if self.composition.is_running(broadcast_id) {
            self.composition
                .switch(broadcast_id, &CompositionSource::camera(&camera))
                .await?;
        }

        info!(broadcast_id, camera_id, camera = %camera.name, "camera switched");
        self.events.publish(BroadcastEvent::CompositionSwitched {
            broadcast_id: broadcast_id.to_string(),
            source_name: camera.name.clone(),
            timestamp: Utc::now(),
        });
        Ok(camera)
    }

    /// Remove a camera. Removing the active camera falls the composition
    /// back to the primary feed.
    pub async fn remove_camera(&self, broadcast_id: &str, camera_id: &str) -> Result<()> {
        let lock = self.lock_for(broadcast_id);
        let _guard = lock.lock().await;

        let broadcast = self.broadcasts.get(broadcast_id).await?;
        let camera = self.cameras.get(camera_id).await?;
        if camera.broadcast_id != broadcast_id {
            return Err(Error::not_found("CameraSource", camera_id));
        }

        let was_active = camera.is_active;
        self.cameras.delete(camera_id).await?;

        if was_active {
            self.cameras.clear_active(broadcast_id).await?;
            if self.composition.is_running(broadcast_id) {
                self.composition
                    .switch(broadcast_id, &CompositionSource::primary(&broadcast))
                    .await?;
            }
        }

        info!(broadcast_id, camera_id, was_active, "camera removed");
        Ok(())
    }

    // ---- Health sweep ----

    /// Run periodic housekeeping until cancelled: reap dead subprocesses
    /// and flag broadcasts whose ingest has gone silent.
    pub fn spawn_sweep(self: &Arc<Self>, cancel_token: CancellationToken) {
        let orchestrator = Arc::clone(self);
        let interval = orchestrator.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("health sweep shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        orchestrator.sweep_once().await;
                    }
                }
            }
        });
    }

    pub async fn sweep_once(&self) {
        self.composition.cleanup_finished();
        self.mixer.cleanup_finished().await;
        self.recording.cleanup_finished().await;

        let cutoff = Utc::now() - self.config.staleness_window;
        match self.broadcasts.list_stale(cutoff).await {
            Ok(stale) => {
                for broadcast in stale {
                    warn!(
                        broadcast_id = %broadcast.id,
                        state = %broadcast.state,
                        last_ingest_at = ?broadcast.last_ingest_at,
                        "broadcast has had no ingest signal within the staleness window"
                    );
                    self.events.publish(BroadcastEvent::BroadcastStalled {
                        broadcast_id: broadcast.id,
                        last_ingest_at: broadcast.last_ingest_at,
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(e) => warn!(error = %e, "staleness query failed"),
        }
    }

    /// Stop every supervised subprocess (shutdown path).
    pub async fn shutdown(&self) {
        let compositions = self.composition.stop_all().await;
        let mixes = self.mixer.stop_all().await;
        let recordings = self.recording.stop_all().await;
        info!(compositions, mixes, recordings, "orchestrator shut down");
    }
}
