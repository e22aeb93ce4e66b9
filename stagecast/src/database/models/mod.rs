//! Database models.
//!
//! `FromRow` structs with RFC 3339 TEXT timestamps; domain entities are
//! converted at the repository boundary.

pub mod audio_mix;
pub mod broadcast;
pub mod camera;
pub mod recording;

pub use audio_mix::AudioMixSessionDbModel;
pub use broadcast::BroadcastDbModel;
pub use camera::CameraSourceDbModel;
pub use recording::RecordingSessionDbModel;

use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Parse a stored RFC 3339 timestamp.
pub(crate) fn parse_ts(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Validation(format!("invalid timestamp in column {}: {}", field, e)))
}

/// Parse an optional stored RFC 3339 timestamp.
pub(crate) fn parse_opt_ts(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_ts(field, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ts_round_trip() {
        let now = Utc::now();
        let parsed = parse_ts("t", &now.to_rfc3339()).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn test_parse_ts_rejects_garbage() {
        assert!(parse_ts("t", "yesterday").is_err());
    }
}
