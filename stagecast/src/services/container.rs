//! Service container for dependency injection.
//!
//! Wires repositories, the subprocess-driven engines and the orchestrator
//! together, and manages their shutdown.

use std::sync::Arc;
use std::time::Duration;

use process_supervisor::{CommandLauncher, Launcher};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::composition::CompositionEngine;
use crate::config::AppConfig;
use crate::database::repositories::{
    SqlxAudioMixRepository, SqlxBroadcastRepository, SqlxCameraRepository, SqlxRecordingRepository,
};
use crate::encoding::EncodingPipeline;
use crate::mixer::AudioMixer;
use crate::notification::{EventBroadcaster, WebhookNotifier};
use crate::orchestrator::BroadcastOrchestrator;
use crate::recording::RecordingSupervisor;
use crate::storage::{HttpStorageClient, StorageClient};
use crate::thumbnail::ThumbnailSampler;

/// Default shutdown timeout.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Service container holding all application services.
pub struct ServiceContainer {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<BroadcastOrchestrator>,
    pub events: EventBroadcaster,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Build the container with the real subprocess launcher.
    pub fn new(pool: SqlitePool, config: AppConfig) -> Self {
        Self::with_launcher(pool, config, Arc::new(CommandLauncher))
    }

    /// Build the container with a custom launcher (tests swap in fakes).
    pub fn with_launcher(
        pool: SqlitePool,
        config: AppConfig,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        info!("initializing service container");

        let config = Arc::new(config);
        let events = EventBroadcaster::new();

        let broadcasts = Arc::new(SqlxBroadcastRepository::new(pool.clone()));
        let cameras = Arc::new(SqlxCameraRepository::new(pool.clone()));
        let recordings = Arc::new(SqlxRecordingRepository::new(pool.clone()));
        let mixes = Arc::new(SqlxAudioMixRepository::new(pool.clone()));

        let storage: Option<Arc<dyn StorageClient>> = config
            .storage_url
            .as_deref()
            .map(|url| Arc::new(HttpStorageClient::new(url)) as Arc<dyn StorageClient>);

        let recording = Arc::new(RecordingSupervisor::new(
            launcher.clone(),
            recordings.clone(),
            events.clone(),
            config.clone(),
        ));
        let encoding = Arc::new(EncodingPipeline::new(
            launcher.clone(),
            recordings,
            storage,
            events.clone(),
            config.clone(),
        ));
        let composition = Arc::new(CompositionEngine::new(launcher.clone(), config.clone()));
        let mixer = Arc::new(AudioMixer::new(launcher.clone(), mixes, config.clone()));
        let thumbnails = Arc::new(ThumbnailSampler::new(launcher, config.clone()));

        let orchestrator = Arc::new(BroadcastOrchestrator::new(
            broadcasts,
            cameras,
            recording,
            encoding,
            composition,
            mixer,
            thumbnails,
            events.clone(),
            config.clone(),
        ));

        info!("service container initialized");

        Self {
            pool,
            config,
            orchestrator,
            events,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start background tasks: the health sweep, the pending-encode pass
    /// and the outbound notifier when one is configured.
    pub fn start_background_tasks(&self) {
        self.orchestrator.spawn_sweep(self.cancellation_token.clone());

        if let Some(url) = &self.config.notify_webhook_url {
            WebhookNotifier::new(url).spawn(&self.events, self.cancellation_token.clone());
            info!(url = %url, "webhook notifier started");
        }

        // Recordings left behind by an unclean shutdown get encoded now.
        let encoding = Arc::clone(&self.orchestrator.encoding);
        tokio::spawn(async move {
            let processed = encoding.encode_pending().await;
            if processed > 0 {
                info!(processed, "caught up on pending encodes");
            }
        });
    }

    /// Shutdown all services gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown all services gracefully with a custom timeout.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        info!("shutting down services (timeout: {:?})", timeout);

        self.cancellation_token.cancel();

        let result = tokio::time::timeout(timeout, self.orchestrator.shutdown()).await;
        if result.is_err() {
            warn!("shutdown timeout reached, abandoning remaining subprocesses");
        }

        info!("closing database pool");
        self.pool.close().await;

        info!("services shut down");
        Ok(())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
