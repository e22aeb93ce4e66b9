//! Recording session entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordingStatus {
    Recording,
    Completed,
    Uploaded,
    Failed,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recording => "RECORDING",
            Self::Completed => "COMPLETED",
            Self::Uploaded => "UPLOADED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RECORDING" => Some(Self::Recording),
            "COMPLETED" => Some(Self::Completed),
            "UPLOADED" => Some(Self::Uploaded),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One continuous capture of a broadcast's output.
///
/// At most one `Recording`-status session exists per broadcast; a `Paused`
/// broadcast keeps its session `Recording` (pause does not stop capture).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSession {
    pub id: String,
    pub broadcast_id: String,
    pub status: RecordingStatus,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    /// Raw capture file, present once recording starts.
    pub raw_path: Option<String>,
    /// Encoded artifact, present after the encoding pipeline succeeds.
    pub encoded_path: Option<String>,
    /// CDN url, present after a successful upload.
    pub upload_url: Option<String>,
}

impl RecordingSession {
    pub fn new(broadcast_id: impl Into<String>, raw_path: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            broadcast_id: broadcast_id.into(),
            status: RecordingStatus::Recording,
            started_at: Utc::now(),
            stopped_at: None,
            raw_path: Some(raw_path.into()),
            encoded_path: None,
            upload_url: None,
        }
    }

    /// Finalize the capture interval.
    pub fn complete(&mut self) {
        self.status = RecordingStatus::Completed;
        self.stopped_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self) {
        self.status = RecordingStatus::Failed;
        if self.stopped_at.is_none() {
            self.stopped_at = Some(Utc::now());
        }
    }

    pub fn mark_uploaded(&mut self, url: impl Into<String>) {
        self.status = RecordingStatus::Uploaded;
        self.upload_url = Some(url.into());
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecordingStatus::Recording
    }
}
