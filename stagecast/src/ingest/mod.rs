//! Ingest webhook events.
//!
//! Notifications from the ingest server are parsed into a closed set of
//! tagged variants before any state lookup. Unknown payload fields are
//! ignored; a missing or empty key is a parse error.

use serde::Deserialize;

use crate::{Error, Result};

/// Webhook payload shared by both ingest events.
///
/// The ingest server sends the key under `key`; older deployments used
/// `name` or `ingest_key`.
#[derive(Debug, Clone, Deserialize)]
pub struct HookPayload {
    #[serde(alias = "name", alias = "ingest_key")]
    pub key: Option<String>,
}

/// A parsed ingest notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// A source started sending video.
    SourceStart { ingest_key: String },
    /// A source stopped sending video.
    SourceStop { ingest_key: String },
}

impl IngestEvent {
    /// Parse an `on-publish` payload.
    pub fn source_start(payload: HookPayload) -> Result<Self> {
        Ok(Self::SourceStart {
            ingest_key: require_key(payload)?,
        })
    }

    /// Parse an `on-publish-done` payload.
    pub fn source_stop(payload: HookPayload) -> Result<Self> {
        Ok(Self::SourceStop {
            ingest_key: require_key(payload)?,
        })
    }

    pub fn ingest_key(&self) -> &str {
        match self {
            Self::SourceStart { ingest_key } | Self::SourceStop { ingest_key } => ingest_key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceStart { .. } => "source_start",
            Self::SourceStop { .. } => "source_stop",
        }
    }
}

fn require_key(payload: HookPayload) -> Result<String> {
    match payload.key {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::validation("missing ingest key in webhook payload")),
    }
}
