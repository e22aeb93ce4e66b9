//! Thumbnail sampler.
//!
//! Grabs a single frame from a broadcast's program feed on a detached task.
//! Best effort only: a broadcast with no thumbnail is fine, so failures are
//! logged and nothing upstream waits on the grab.

use std::sync::Arc;

use process_supervisor::{Launcher, SpawnSpec};
use tracing::{debug, warn};

use crate::config::{AppConfig, path_arg};
use crate::{Error, Result};

pub struct ThumbnailSampler {
    launcher: Arc<dyn Launcher>,
    config: Arc<AppConfig>,
}

impl ThumbnailSampler {
    pub fn new(launcher: Arc<dyn Launcher>, config: Arc<AppConfig>) -> Self {
        Self { launcher, config }
    }

    fn spawn_spec(&self, broadcast_id: &str) -> SpawnSpec {
        SpawnSpec::new(&self.config.ffmpeg_path)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-i", &self.config.output_url(broadcast_id)])
            .args(["-vframes", "1"])
            .args(["-vf", "scale=320:-1"])
            .args(["-q:v", "2"])
            .arg(path_arg(&self.config.thumbnail_path(broadcast_id)))
            .env("LC_ALL", "C")
    }

    /// Kick off a thumbnail grab on a detached task and return immediately.
    pub fn sample_detached(self: &Arc<Self>, broadcast_id: &str) {
        let sampler = Arc::clone(self);
        let broadcast_id = broadcast_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = sampler.sample(&broadcast_id).await {
                warn!(broadcast_id = %broadcast_id, error = %e, "thumbnail grab failed");
            }
        });
    }

    /// Grab one frame, bounded by the thumbnail deadline.
    pub async fn sample(&self, broadcast_id: &str) -> Result<()> {
        let path = self.config.thumbnail_path(broadcast_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let spec = self.spawn_spec(broadcast_id);
        let mut child = self.launcher.launch(&spec).await?;

        let exit = match tokio::time::timeout(self.config.thumbnail_timeout, child.wait()).await {
            Ok(result) => result?,
            Err(_) => {
                child.kill().await?;
                let _ = child.wait().await;
                return Err(Error::subprocess(format!(
                    "thumbnail grab exceeded {}s deadline",
                    self.config.thumbnail_timeout.as_secs()
                )));
            }
        };

        if !exit.success() {
            return Err(Error::subprocess(format!(
                "thumbnail grab exited with code {:?}",
                exit.code
            )));
        }

        debug!(broadcast_id, path = %path.display(), "thumbnail sampled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBehavior, FakeLauncher};

    fn sampler(behavior: FakeBehavior) -> (Arc<ThumbnailSampler>, Arc<FakeLauncher>, tempfile::TempDir) {
        let media = tempfile::tempdir().unwrap();
        let config = AppConfig {
            media_root: media.path().to_path_buf(),
            thumbnail_timeout: std::time::Duration::from_millis(50),
            ..AppConfig::default()
        };
        let launcher = Arc::new(FakeLauncher::with_behavior(behavior));
        (
            Arc::new(ThumbnailSampler::new(launcher.clone(), Arc::new(config))),
            launcher,
            media,
        )
    }

    #[tokio::test]
    async fn test_sample_succeeds_on_clean_exit() {
        let (sampler, launcher, _media) = sampler(FakeBehavior::ExitImmediately);

        sampler.sample("b1").await.unwrap();

        let spec = launcher.spawned().pop().unwrap();
        let joined = spec.args.join(" ");
        assert!(joined.contains("-vframes 1"));
        assert!(joined.contains("b1.jpg"));
    }

    #[tokio::test]
    async fn test_sample_fails_on_nonzero_exit() {
        let (sampler, _launcher, _media) = sampler(FakeBehavior::ExitWith(1));
        let err = sampler.sample("b1").await.unwrap_err();
        assert!(matches!(err, Error::Subprocess(_)));
    }

    #[tokio::test]
    async fn test_sample_kills_on_deadline() {
        let (sampler, _launcher, _media) = sampler(FakeBehavior::IgnoreQuit);
        let err = sampler.sample("b1").await.unwrap_err();
        assert!(matches!(err, Error::Subprocess(_)));
    }
}
