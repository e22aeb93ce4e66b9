//! Recording session database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{parse_opt_ts, parse_ts};
use crate::Result;
use crate::domain::{RecordingSession, RecordingStatus};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RecordingSessionDbModel {
    pub id: String,
    pub broadcast_id: String,
    pub status: String,
    pub started_at: String,
    pub stopped_at: Option<String>,
    pub raw_path: Option<String>,
    pub encoded_path: Option<String>,
    pub upload_url: Option<String>,
}

impl RecordingSessionDbModel {
    pub fn from_entity(entity: &RecordingSession) -> Self {
        Self {
            id: entity.id.clone(),
            broadcast_id: entity.broadcast_id.clone(),
            status: entity.status.as_str().to_string(),
            started_at: entity.started_at.to_rfc3339(),
            stopped_at: entity.stopped_at.map(|t| t.to_rfc3339()),
            raw_path: entity.raw_path.clone(),
            encoded_path: entity.encoded_path.clone(),
            upload_url: entity.upload_url.clone(),
        }
    }

    pub fn into_entity(self) -> Result<RecordingSession> {
        let status = RecordingStatus::parse(&self.status).ok_or_else(|| {
            crate::Error::Validation(format!("unknown recording status '{}'", self.status))
        })?;
        Ok(RecordingSession {
            status,
            started_at: parse_ts("started_at", &self.started_at)?,
            stopped_at: parse_opt_ts("stopped_at", self.stopped_at.as_deref())?,
            id: self.id,
            broadcast_id: self.broadcast_id,
            raw_path: self.raw_path,
            encoded_path: self.encoded_path,
            upload_url: self.upload_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_round_trip() {
        let mut entity = RecordingSession::new("b1", "/media/b1/raw.flv");
        entity.complete();

        let back = RecordingSessionDbModel::from_entity(&entity)
            .into_entity()
            .unwrap();
        assert_eq!(back.status, RecordingStatus::Completed);
        assert_eq!(back.raw_path.as_deref(), Some("/media/b1/raw.flv"));
    }
}
