//! Audio mixer.
//!
//! Mixes the program feed's audio with an optional looping background track
//! and any registered sound effects into one ffmpeg filter graph, published
//! as the broadcast's mix feed. Volumes are baked into the filter graph at
//! spawn time; changing the persisted mix state takes effect on the next
//! start or restart, never mid-process.

use std::sync::Arc;

use process_supervisor::{Launcher, ProcessRegistry, ProcessSupervisor, SpawnSpec, StopOutcome};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, path_arg};
use crate::database::repositories::AudioMixRepository;
use crate::domain::{AudioMixSession, BackgroundTrack, MixConfig, SoundEffect};
use crate::{Error, Result};

/// Supervises one mixing subprocess per broadcast and owns the persisted
/// mix-session state.
pub struct AudioMixer {
    launcher: Arc<dyn Launcher>,
    registry: ProcessRegistry,
    repo: Arc<dyn AudioMixRepository>,
    config: Arc<AppConfig>,
}

impl AudioMixer {
    pub fn new(
        launcher: Arc<dyn Launcher>,
        repo: Arc<dyn AudioMixRepository>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            launcher,
            registry: ProcessRegistry::new("audio_mix"),
            repo,
            config,
        }
    }

    /// Build the filter graph for a mix session.
    ///
    /// Input 0 is always the program feed; the background track and each
    /// effect follow in order. Every input runs through a `volume` filter
    /// (bus level x per-input level where one exists), then `amix` folds
    /// them together and the master bus scales the result.
    fn filter_graph(mix: &AudioMixSession) -> String {
        let mut chains = Vec::new();
        let mut labels = Vec::new();

        chains.push("[0:a]volume=1.0[prog]".to_string());
        labels.push("[prog]".to_string());

        let mut input_index = 1usize;
        if let Some(track) = active_track(mix) {
            let level = MixConfig::factor(mix.config.music_volume) * MixConfig::factor(track.volume);
            chains.push(format!("[{}:a]volume={:.3}[bg]", input_index, level));
            labels.push("[bg]".to_string());
            input_index += 1;
        }

        for (n, effect) in mix.effects.iter().enumerate() {
            let level =
                MixConfig::factor(mix.config.effects_volume) * MixConfig::factor(effect.volume);
            chains.push(format!("[{}:a]volume={:.3}[fx{}]", input_index, level, n));
            labels.push(format!("[fx{}]", n));
            input_index += 1;
        }

        let master = MixConfig::factor(mix.config.master_volume);
        chains.push(format!(
            "{}amix=inputs={}:duration=first:dropout_transition=0,volume={:.3}[out]",
            labels.concat(),
            labels.len(),
            master
        ));

        chains.join(";")
    }

    fn spawn_spec(&self, mix: &AudioMixSession) -> SpawnSpec {
        let mut spec = SpawnSpec::new(&self.config.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-i", &self.config.output_url(&mix.broadcast_id)]);

        if let Some(track) = active_track(mix) {
            // Loop the music bed; resume from the persisted position.
            spec = spec.args(["-stream_loop", "-1"]);
            if track.position_secs > 0.0 {
                spec = spec.args(["-ss", &format!("{:.3}", track.position_secs)]);
            }
            spec = spec.args(["-i", &path_arg(&self.config.track_path(&track.track_id))]);
        }

        for effect in &mix.effects {
            spec = spec.args(["-i", &path_arg(&self.config.effect_path(&effect.effect_id))]);
        }

        spec.args(["-filter_complex", &Self::filter_graph(mix)])
            .args(["-map", "[out]", "-map", "0:v?"])
            .args(["-c:v", "copy", "-c:a", "aac", "-b:a", "192k"])
            .args(["-f", "flv"])
            .arg(self.config.mix_output_url(&mix.broadcast_id))
            .env("LC_ALL", "C")
            .quit_command(b"q".to_vec())
    }

    /// Start (or restart) mixing for a broadcast using its persisted mix
    /// session, creating a default session if none exists yet.
    pub async fn start(&self, broadcast_id: &str) -> Result<AudioMixSession> {
        let mut mix = match self.repo.get_for_broadcast(broadcast_id).await? {
            Some(mix) => mix,
            None => AudioMixSession::new(broadcast_id),
        };

        if self.registry.contains(broadcast_id) {
            debug!(broadcast_id, "mixer already running, restarting");
            self.registry
                .stop(broadcast_id, self.config.stop_grace)
                .await?;
        }

        let spec = self.spawn_spec(&mix);
        let child = self.launcher.launch(&spec).await?;
        let sup = ProcessSupervisor::new(child, spec.program.clone());

        if let Some(mut displaced) = self.registry.insert(broadcast_id.to_string(), sup) {
            warn!(broadcast_id, "displaced a concurrent mixer process");
            let _ = displaced.stop(self.config.stop_grace).await;
        }

        mix.activate();
        if let Err(e) = self.repo.upsert(&mix).await {
            // Process without a persisted active session is worse than no
            // process at all.
            let _ = self
                .registry
                .stop(broadcast_id, self.config.stop_grace)
                .await;
            return Err(e);
        }

        info!(
            broadcast_id,
            effects = mix.effects.len(),
            has_track = mix.background_track.is_some(),
            "audio mix started"
        );
        Ok(mix)
    }

    /// Stop the mixer and mark the session inactive.
    pub async fn stop(&self, broadcast_id: &str) -> Result<Option<StopOutcome>> {
        let outcome = self
            .registry
            .stop(broadcast_id, self.config.stop_grace)
            .await?;

        if let Some(mut mix) = self.repo.get_for_broadcast(broadcast_id).await? {
            if mix.is_active {
                mix.deactivate();
                self.repo.upsert(&mix).await?;
            }
        }

        if outcome.is_some() {
            info!(broadcast_id, "audio mix stopped");
        }
        Ok(outcome)
    }

    /// Persist a new mix configuration.
    ///
    /// Takes effect on the next mixer (re)start; a running process keeps its
    /// baked-in volumes. Returns the session so callers can surface that.
    pub async fn update_config(&self, broadcast_id: &str, config: MixConfig) -> Result<AudioMixSession> {
        self.mutate(broadcast_id, |mix| mix.set_config(config)).await
    }

    /// Persist the background track selection (or clear it with `None`).
    pub async fn set_background_track(
        &self,
        broadcast_id: &str,
        track: Option<BackgroundTrack>,
    ) -> Result<AudioMixSession> {
        self.mutate(broadcast_id, |mix| mix.set_background_track(track))
            .await
    }

    /// Register a sound effect in the persisted mix state.
    pub async fn add_effect(&self, broadcast_id: &str, effect: SoundEffect) -> Result<AudioMixSession> {
        self.mutate(broadcast_id, |mix| mix.add_effect(effect)).await
    }

    /// Remove a sound effect from the persisted mix state.
    pub async fn clear_effect(&self, broadcast_id: &str, effect_id: &str) -> Result<AudioMixSession> {
        self.mutate(broadcast_id, |mix| mix.clear_effect(effect_id))
            .await
    }

    async fn mutate<F>(&self, broadcast_id: &str, apply: F) -> Result<AudioMixSession>
    where
        F: FnOnce(&mut AudioMixSession),
    {
        let mut mix = match self.repo.get_for_broadcast(broadcast_id).await? {
            Some(mix) => mix,
            None => AudioMixSession::new(broadcast_id),
        };
        apply(&mut mix);
        self.repo.upsert(&mix).await?;

        if self.registry.contains(broadcast_id) {
            debug!(
                broadcast_id,
                "mix state updated while mixer running; restart to apply"
            );
        }
        Ok(mix)
    }

    /// Fetch the persisted mix session for a broadcast.
    pub async fn get(&self, broadcast_id: &str) -> Result<AudioMixSession> {
        self.repo
            .get_for_broadcast(broadcast_id)
            .await?
            .ok_or_else(|| Error::not_found("AudioMixSession", broadcast_id))
    }

    /// All persisted mix sessions currently marked active.
    pub async fn list_active(&self) -> Result<Vec<AudioMixSession>> {
        self.repo.list_active().await
    }

    pub fn is_running(&self, broadcast_id: &str) -> bool {
        self.registry.contains(broadcast_id)
    }

    pub fn active_broadcasts(&self) -> Vec<String> {
        self.registry.active_ids()
    }

    /// Reap mixer processes that died on their own and deactivate their
    /// persisted sessions so state and reality agree.
    pub async fn cleanup_finished(&self) -> Vec<String> {
        let mut cleaned = Vec::new();
        for (broadcast_id, exit) in self.registry.reap_finished() {
            warn!(
                broadcast_id = %broadcast_id,
                code = ?exit.code,
                "mixer process exited on its own"
            );
            match self.repo.get_for_broadcast(&broadcast_id).await {
                Ok(Some(mut mix)) if mix.is_active => {
                    mix.deactivate();
                    if let Err(e) = self.repo.upsert(&mix).await {
                        warn!(broadcast_id = %broadcast_id, error = %e, "failed to deactivate mix session");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(broadcast_id = %broadcast_id, error = %e, "failed to load mix session");
                }
            }
            cleaned.push(broadcast_id);
        }
        cleaned
    }

    /// Stop every mixer process (shutdown path).
    pub async fn stop_all(&self) -> usize {
        self.registry.stop_all(self.config.stop_grace).await
    }
}

fn active_track(mix: &AudioMixSession) -> Option<&BackgroundTrack> {
    mix.background_track.as_ref().filter(|t| t.playing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::SqlxAudioMixRepository;
    use crate::testing::FakeLauncher;

    async fn setup() -> (AudioMixer, Arc<FakeLauncher>) {
        let pool = crate::database::init_pool("sqlite::memory:").await.unwrap();
        crate::database::run_migrations(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO broadcasts (id, title, ingest_key, state, created_at, updated_at)
             VALUES ('b1', 'Test', 'key-b1', 'LIVE', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let launcher = Arc::new(FakeLauncher::new());
        let repo = Arc::new(SqlxAudioMixRepository::new(pool));
        let mixer = AudioMixer::new(launcher.clone(), repo, Arc::new(AppConfig::default()));
        (mixer, launcher)
    }

    #[tokio::test]
    async fn test_start_creates_and_activates_session() {
        let (mixer, launcher) = setup().await;

        let mix = mixer.start("b1").await.unwrap();
        assert!(mix.is_active);
        assert!(mixer.is_running("b1"));
        assert_eq!(launcher.spawn_count(), 1);

        let persisted = mixer.get("b1").await.unwrap();
        assert!(persisted.is_active);
    }

    #[tokio::test]
    async fn test_stop_deactivates_session() {
        let (mixer, _launcher) = setup().await;

        mixer.start("b1").await.unwrap();
        let outcome = mixer.stop("b1").await.unwrap();
        assert!(outcome.is_some());
        assert!(!mixer.is_running("b1"));
        assert!(!mixer.get("b1").await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_stop_without_process_is_noop() {
        let (mixer, _launcher) = setup().await;
        assert!(mixer.stop("b1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restart_keeps_single_process() {
        let (mixer, launcher) = setup().await;

        mixer.start("b1").await.unwrap();
        mixer.start("b1").await.unwrap();

        assert_eq!(launcher.spawn_count(), 2);
        assert_eq!(mixer.active_broadcasts(), vec!["b1".to_string()]);
    }

    #[tokio::test]
    async fn test_update_config_persists_without_touching_process() {
        let (mixer, launcher) = setup().await;
        mixer.start("b1").await.unwrap();

        let mix = mixer
            .update_config("b1", MixConfig::clamped(80, 200, -5))
            .await
            .unwrap();

        assert_eq!(mix.config.master_volume, 80);
        assert_eq!(mix.config.music_volume, 100);
        assert_eq!(mix.config.effects_volume, 0);
        // No restart happened.
        assert_eq!(launcher.spawn_count(), 1);
    }

    #[tokio::test]
    async fn test_spawn_spec_includes_track_and_effects() {
        let (mixer, launcher) = setup().await;

        mixer
            .set_background_track("b1", Some(BackgroundTrack::new("bed.mp3", 60)))
            .await
            .unwrap();
        mixer
            .add_effect("b1", SoundEffect::new("applause.wav", 80))
            .await
            .unwrap();
        mixer.start("b1").await.unwrap();

        let spec = launcher.spawned().pop().unwrap();
        let joined = spec.args.join(" ");
        assert!(joined.contains("-stream_loop"));
        assert!(joined.contains("tracks/bed.mp3") || joined.contains("tracks\\bed.mp3"));
        assert!(joined.contains("effects/applause.wav") || joined.contains("effects\\applause.wav"));
        assert!(joined.contains("amix=inputs=3"));
        assert_eq!(spec.quit_command, Some(b"q".to_vec()));
    }

    #[test]
    fn test_filter_graph_applies_bus_levels() {
        let mut mix = AudioMixSession::new("b1");
        mix.set_config(MixConfig::clamped(50, 50, 100));
        mix.set_background_track(Some(BackgroundTrack::new("bed.mp3", 50)));

        let graph = AudioMixer::filter_graph(&mix);
        // music bus 0.5 x track 0.5
        assert!(graph.contains("volume=0.250[bg]"));
        assert!(graph.contains("volume=0.500[out]"));
        assert!(graph.contains("amix=inputs=2"));
    }

    #[test]
    fn test_paused_track_is_excluded() {
        let mut mix = AudioMixSession::new("b1");
        let mut track = BackgroundTrack::new("bed.mp3", 100);
        track.playing = false;
        mix.set_background_track(Some(track));

        let graph = AudioMixer::filter_graph(&mix);
        assert!(graph.contains("amix=inputs=1"));
        assert!(!graph.contains("[bg]"));
    }
}
