//! Broadcast database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{parse_opt_ts, parse_ts};
use crate::Result;
use crate::domain::{BroadcastSession, BroadcastState};

/// Broadcast row, timestamps stored as RFC 3339 text.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BroadcastDbModel {
    pub id: String,
    pub title: String,
    pub ingest_key: String,
    pub state: String,
    pub started_at: Option<String>,
    pub paused_at: Option<String>,
    pub ended_at: Option<String>,
    pub last_ingest_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl BroadcastDbModel {
    pub fn from_entity(entity: &BroadcastSession) -> Self {
        Self {
            id: entity.id.clone(),
            title: entity.title.clone(),
            ingest_key: entity.ingest_key.clone(),
            state: entity.state.as_str().to_string(),
            started_at: entity.started_at.map(|t| t.to_rfc3339()),
            paused_at: entity.paused_at.map(|t| t.to_rfc3339()),
            ended_at: entity.ended_at.map(|t| t.to_rfc3339()),
            last_ingest_at: entity.last_ingest_at.map(|t| t.to_rfc3339()),
            created_at: entity.created_at.to_rfc3339(),
            updated_at: entity.updated_at.to_rfc3339(),
        }
    }

    pub fn into_entity(self) -> Result<BroadcastSession> {
        let state = BroadcastState::parse(&self.state).ok_or_else(|| {
            crate::Error::Validation(format!("unknown broadcast state '{}'", self.state))
        })?;
        Ok(BroadcastSession {
            state,
            started_at: parse_opt_ts("started_at", self.started_at.as_deref())?,
            paused_at: parse_opt_ts("paused_at", self.paused_at.as_deref())?,
            ended_at: parse_opt_ts("ended_at", self.ended_at.as_deref())?,
            last_ingest_at: parse_opt_ts("last_ingest_at", self.last_ingest_at.as_deref())?,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            id: self.id,
            title: self.title,
            ingest_key: self.ingest_key,
        })
    }
}
