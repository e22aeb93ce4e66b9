//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("{resource} already active for broadcast {broadcast_id}")]
    AlreadyActive {
        resource: &'static str,
        broadcast_id: String,
    },

    #[error("{resource} not active for broadcast {broadcast_id}")]
    NotActive {
        resource: &'static str,
        broadcast_id: String,
    },

    #[error("Subprocess failure: {0}")]
    Subprocess(String),

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn already_active(resource: &'static str, broadcast_id: impl Into<String>) -> Self {
        Self::AlreadyActive {
            resource,
            broadcast_id: broadcast_id.into(),
        }
    }

    pub fn not_active(resource: &'static str, broadcast_id: impl Into<String>) -> Self {
        Self::NotActive {
            resource,
            broadcast_id: broadcast_id.into(),
        }
    }

    pub fn subprocess(msg: impl Into<String>) -> Self {
        Self::Subprocess(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<process_supervisor::SupervisorError> for Error {
    fn from(err: process_supervisor::SupervisorError) -> Self {
        Self::Subprocess(err.to_string())
    }
}
