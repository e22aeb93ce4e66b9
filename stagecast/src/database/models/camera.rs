//! Camera source database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::parse_ts;
use crate::Result;
use crate::domain::CameraSource;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CameraSourceDbModel {
    pub id: String,
    pub broadcast_id: String,
    pub name: String,
    pub ingest_key: String,
    pub is_active: i64,
    pub created_at: String,
}

impl CameraSourceDbModel {
    pub fn from_entity(entity: &CameraSource) -> Self {
        Self {
            id: entity.id.clone(),
            broadcast_id: entity.broadcast_id.clone(),
            name: entity.name.clone(),
            ingest_key: entity.ingest_key.clone(),
            is_active: i64::from(entity.is_active),
            created_at: entity.created_at.to_rfc3339(),
        }
    }

    pub fn into_entity(self) -> Result<CameraSource> {
        Ok(CameraSource {
            created_at: parse_ts("created_at", &self.created_at)?,
            is_active: self.is_active != 0,
            id: self.id,
            broadcast_id: self.broadcast_id,
            name: self.name,
            ingest_key: self.ingest_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_round_trip() {
        let mut entity = CameraSource::new("b1", "Stage left");
        entity.is_active = true;

        let back = CameraSourceDbModel::from_entity(&entity).into_entity().unwrap();
        assert_eq!(back.id, entity.id);
        assert!(back.is_active);
    }
}
