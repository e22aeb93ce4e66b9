//! Broadcast session entity and lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lifecycle state of a broadcast.
///
/// `Scheduled -> Live <-> Paused -> Ended`; `Ended` is terminal and reachable
/// from every non-terminal state. Ingest events never produce `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastState {
    Scheduled,
    Live,
    Paused,
    Ended,
}

impl BroadcastState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Live => "LIVE",
            Self::Paused => "PAUSED",
            Self::Ended => "ENDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(Self::Scheduled),
            "LIVE" => Some(Self::Live),
            "PAUSED" => Some(Self::Paused),
            "ENDED" => Some(Self::Ended),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl std::fmt::Display for BroadcastState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled event capable of going live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastSession {
    pub id: String,
    pub title: String,
    /// Opaque token correlating external ingest traffic to this broadcast.
    pub ingest_key: String,
    pub state: BroadcastState,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Last time any ingest event touched this broadcast; drives the
    /// staleness sweep.
    pub last_ingest_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BroadcastSession {
    /// Create a newly scheduled broadcast with a generated ingest key.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            ingest_key: generate_ingest_key(),
            state: BroadcastState::Scheduled,
            started_at: None,
            paused_at: None,
            ended_at: None,
            last_ingest_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition into `Live`.
    ///
    /// Returns `true` if this is the first-ever live transition (the caller
    /// starts a recording session on it). Already-`Live` is an idempotent
    /// no-op; `Ended` is rejected.
    pub fn go_live(&mut self) -> Result<bool> {
        match self.state {
            BroadcastState::Ended => Err(Error::invalid_transition(
                self.state.as_str(),
                BroadcastState::Live.as_str(),
            )),
            BroadcastState::Live => Ok(false),
            BroadcastState::Scheduled | BroadcastState::Paused => {
                let first = self.started_at.is_none();
                if first {
                    self.started_at = Some(Utc::now());
                }
                self.state = BroadcastState::Live;
                self.touch();
                Ok(first)
            }
        }
    }

    /// Transition into `Paused`. Never terminal; already-`Paused` keeps the
    /// original `paused_at`.
    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            BroadcastState::Ended => Err(Error::invalid_transition(
                self.state.as_str(),
                BroadcastState::Paused.as_str(),
            )),
            BroadcastState::Paused => Ok(()),
            BroadcastState::Scheduled | BroadcastState::Live => {
                self.state = BroadcastState::Paused;
                self.paused_at = Some(Utc::now());
                self.touch();
                Ok(())
            }
        }
    }

    /// Transition into `Ended`. Valid from any non-terminal state.
    pub fn end(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::invalid_transition(
                self.state.as_str(),
                BroadcastState::Ended.as_str(),
            ));
        }
        self.state = BroadcastState::Ended;
        self.ended_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Record an ingest liveness signal.
    pub fn mark_ingest_seen(&mut self) {
        self.last_ingest_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Generate an opaque ingest key.
pub fn generate_ingest_key() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_broadcast_is_scheduled() {
        let broadcast = BroadcastSession::new("Launch event");
        assert_eq!(broadcast.state, BroadcastState::Scheduled);
        assert!(broadcast.started_at.is_none());
        assert_eq!(broadcast.ingest_key.len(), 32);
    }

    #[test]
    fn test_first_go_live_sets_started_at() {
        let mut broadcast = BroadcastSession::new("Launch event");

        let first = broadcast.go_live().unwrap();
        assert!(first);
        assert_eq!(broadcast.state, BroadcastState::Live);
        assert!(broadcast.started_at.is_some());
    }

    #[test]
    fn test_resume_is_not_first_live() {
        let mut broadcast = BroadcastSession::new("Launch event");
        broadcast.go_live().unwrap();
        let started = broadcast.started_at;

        broadcast.pause().unwrap();
        let first = broadcast.go_live().unwrap();

        assert!(!first);
        assert_eq!(broadcast.started_at, started);
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut broadcast = BroadcastSession::new("Launch event");
        broadcast.go_live().unwrap();
        broadcast.pause().unwrap();
        let paused_at = broadcast.paused_at;

        broadcast.pause().unwrap();
        assert_eq!(broadcast.paused_at, paused_at);
        assert_eq!(broadcast.state, BroadcastState::Paused);
    }

    #[test]
    fn test_ended_is_terminal() {
        let mut broadcast = BroadcastSession::new("Launch event");
        broadcast.go_live().unwrap();
        broadcast.end().unwrap();

        assert!(broadcast.go_live().is_err());
        assert!(broadcast.pause().is_err());
        assert!(broadcast.end().is_err());
        assert_eq!(broadcast.state, BroadcastState::Ended);
    }

    #[test]
    fn test_end_from_scheduled() {
        let mut broadcast = BroadcastSession::new("Cancelled event");
        broadcast.end().unwrap();
        assert_eq!(broadcast.state, BroadcastState::Ended);
        assert!(broadcast.started_at.is_none());
    }

    #[test]
    fn test_state_round_trip() {
        for state in [
            BroadcastState::Scheduled,
            BroadcastState::Live,
            BroadcastState::Paused,
            BroadcastState::Ended,
        ] {
            assert_eq!(BroadcastState::parse(state.as_str()), Some(state));
        }
        assert_eq!(BroadcastState::parse("BOGUS"), None);
    }
}
