//! Camera source entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An additional named ingest feed belonging to a broadcast.
///
/// At most one camera (or the broadcast's primary feed) is the composition
/// engine's input at a time; the repository enforces the single-active flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSource {
    pub id: String,
    pub broadcast_id: String,
    pub name: String,
    pub ingest_key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl CameraSource {
    pub fn new(broadcast_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            broadcast_id: broadcast_id.into(),
            name: name.into(),
            ingest_key: super::broadcast::generate_ingest_key(),
            is_active: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_camera_is_inactive() {
        let camera = CameraSource::new("b1", "Stage left");
        assert!(!camera.is_active);
        assert_eq!(camera.broadcast_id, "b1");
        assert_eq!(camera.ingest_key.len(), 32);
    }
}
