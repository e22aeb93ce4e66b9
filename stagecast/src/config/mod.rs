//! Application configuration.
//!
//! Environment-driven with sensible defaults; `dotenvy` is loaded in `main`
//! before any of this is read.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Root directory for recordings, encoded files, thumbnails and mix assets.
    pub media_root: PathBuf,
    /// Directory for rotated log files.
    pub log_dir: String,
    /// ffmpeg binary path.
    pub ffmpeg_path: String,
    /// Base URL the ingest server publishes sources under (key appended).
    pub ingest_base_url: String,
    /// Base URL composited program feeds are republished under.
    pub output_base_url: String,
    /// Grace period for subprocess stop before escalating to kill.
    pub stop_grace: Duration,
    /// Settle delay between stop and restart on a composition switch.
    pub settle_delay: Duration,
    /// Upper bound for one encoding run.
    pub encode_timeout: Duration,
    /// Upper bound for a thumbnail grab.
    pub thumbnail_timeout: Duration,
    /// x264 preset for the encoding pipeline.
    pub encode_preset: String,
    /// Constant rate factor for the encoding pipeline.
    pub encode_crf: u8,
    /// Ingest silence beyond this window marks a broadcast stale.
    pub staleness_window: Duration,
    /// Interval between health sweeps.
    pub sweep_interval: Duration,
    /// Storage/CDN upload endpoint; uploads are skipped when unset.
    pub storage_url: Option<String>,
    /// Webhook sink for outbound notifications; disabled when unset.
    pub notify_webhook_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:stagecast.db?mode=rwc".to_string(),
            media_root: PathBuf::from("media"),
            log_dir: "logs".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ingest_base_url: "rtmp://127.0.0.1:1935/ingest".to_string(),
            output_base_url: "rtmp://127.0.0.1:1935/live".to_string(),
            stop_grace: Duration::from_secs(3),
            settle_delay: Duration::from_millis(500),
            encode_timeout: Duration::from_secs(3600),
            thumbnail_timeout: Duration::from_secs(30),
            encode_preset: "veryfast".to_string(),
            encode_crf: 23,
            staleness_window: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(30),
            storage_url: None,
            notify_webhook_url: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Some(url) = env_string("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(root) = env_string("MEDIA_ROOT") {
            config.media_root = PathBuf::from(root);
        }
        if let Some(dir) = env_string("LOG_DIR") {
            config.log_dir = dir;
        }
        if let Some(path) = env_string("FFMPEG_PATH") {
            config.ffmpeg_path = path;
        }
        if let Some(url) = env_string("INGEST_BASE_URL") {
            config.ingest_base_url = url;
        }
        if let Some(url) = env_string("OUTPUT_BASE_URL") {
            config.output_base_url = url;
        }
        if let Some(secs) = env_parse::<u64>("STOP_GRACE_SECS") {
            config.stop_grace = Duration::from_secs(secs);
        }
        if let Some(ms) = env_parse::<u64>("SWITCH_SETTLE_MS") {
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = env_parse::<u64>("ENCODE_TIMEOUT_SECS") {
            config.encode_timeout = Duration::from_secs(secs);
        }
        if let Some(preset) = env_string("ENCODE_PRESET") {
            config.encode_preset = preset;
        }
        if let Some(crf) = env_parse::<u8>("ENCODE_CRF") {
            config.encode_crf = crf;
        }
        if let Some(secs) = env_parse::<u64>("STALENESS_WINDOW_SECS") {
            config.staleness_window = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("SWEEP_INTERVAL_SECS") {
            config.sweep_interval = Duration::from_secs(secs);
        }
        config.storage_url = env_string("STORAGE_URL");
        config.notify_webhook_url = env_string("NOTIFY_WEBHOOK_URL");

        config
    }

    /// URL the ingest server exposes a published source under.
    pub fn ingest_url(&self, ingest_key: &str) -> String {
        format!("{}/{}", self.ingest_base_url.trim_end_matches('/'), ingest_key)
    }

    /// URL of a broadcast's composited program feed.
    pub fn output_url(&self, broadcast_id: &str) -> String {
        format!("{}/{}", self.output_base_url.trim_end_matches('/'), broadcast_id)
    }

    /// URL of a broadcast's mixed audio feed.
    pub fn mix_output_url(&self, broadcast_id: &str) -> String {
        format!(
            "{}/mix-{}",
            self.output_base_url.trim_end_matches('/'),
            broadcast_id
        )
    }

    pub fn raw_recording_path(&self, broadcast_id: &str, recording_id: &str) -> PathBuf {
        self.media_root
            .join("recordings")
            .join(broadcast_id)
            .join(format!("{}.flv", recording_id))
    }

    pub fn encoded_path(&self, recording_id: &str) -> PathBuf {
        self.media_root
            .join("encoded")
            .join(format!("{}.mp4", recording_id))
    }

    pub fn thumbnail_path(&self, broadcast_id: &str) -> PathBuf {
        self.media_root
            .join("thumbnails")
            .join(format!("{}.jpg", broadcast_id))
    }

    pub fn track_path(&self, track_id: &str) -> PathBuf {
        self.media_root.join("tracks").join(track_id)
    }

    pub fn effect_path(&self, effect_id: &str) -> PathBuf {
        self.media_root.join("effects").join(effect_id)
    }
}

/// Path as a string for subprocess argument lists.
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}
