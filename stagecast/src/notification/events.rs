//! Broadcast lifecycle events for downstream consumers.
//!
//! Events are published to a broadcast channel; the webhook notifier and any
//! other subscriber consume them off the transition path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the orchestrator and its components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BroadcastEvent {
    /// A broadcast went live.
    BroadcastLive {
        broadcast_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A broadcast's source stopped; the broadcast is paused, not ended.
    BroadcastPaused {
        broadcast_id: String,
        timestamp: DateTime<Utc>,
    },
    /// An operator ended a broadcast.
    BroadcastEnded {
        broadcast_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Recording capture started.
    RecordingStarted {
        broadcast_id: String,
        recording_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Recording capture stopped.
    RecordingStopped {
        broadcast_id: String,
        recording_id: String,
        timestamp: DateTime<Utc>,
    },
    /// An encoded recording was handed to storage.
    RecordingUploaded {
        broadcast_id: String,
        recording_id: String,
        url: String,
        timestamp: DateTime<Utc>,
    },
    /// Encoding failed; the recording is marked failed and not retried here.
    EncodingFailed {
        broadcast_id: String,
        recording_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// The composition engine switched to a different source.
    CompositionSwitched {
        broadcast_id: String,
        source_name: String,
        timestamp: DateTime<Utc>,
    },
    /// A live/paused broadcast has had no ingest signal within the staleness
    /// window. Surfaced for operators; no state change is made.
    BroadcastStalled {
        broadcast_id: String,
        last_ingest_at: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },
}

impl BroadcastEvent {
    /// Canonical event name for outbound payloads.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::BroadcastLive { .. } => "broadcast_live",
            Self::BroadcastPaused { .. } => "broadcast_paused",
            Self::BroadcastEnded { .. } => "broadcast_ended",
            Self::RecordingStarted { .. } => "recording_started",
            Self::RecordingStopped { .. } => "recording_stopped",
            Self::RecordingUploaded { .. } => "recording_uploaded",
            Self::EncodingFailed { .. } => "encoding_failed",
            Self::CompositionSwitched { .. } => "composition_switched",
            Self::BroadcastStalled { .. } => "broadcast_stalled",
        }
    }

    pub fn broadcast_id(&self) -> &str {
        match self {
            Self::BroadcastLive { broadcast_id, .. }
            | Self::BroadcastPaused { broadcast_id, .. }
            | Self::BroadcastEnded { broadcast_id, .. }
            | Self::RecordingStarted { broadcast_id, .. }
            | Self::RecordingStopped { broadcast_id, .. }
            | Self::RecordingUploaded { broadcast_id, .. }
            | Self::EncodingFailed { broadcast_id, .. }
            | Self::CompositionSwitched { broadcast_id, .. }
            | Self::BroadcastStalled { broadcast_id, .. } => broadcast_id,
        }
    }

    /// Get a human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            Self::BroadcastLive { broadcast_id, .. } => {
                format!("broadcast {} is live", broadcast_id)
            }
            Self::BroadcastPaused { broadcast_id, .. } => {
                format!("broadcast {} paused", broadcast_id)
            }
            Self::BroadcastEnded { broadcast_id, .. } => {
                format!("broadcast {} ended", broadcast_id)
            }
            Self::RecordingStarted { recording_id, .. } => {
                format!("recording {} started", recording_id)
            }
            Self::RecordingStopped { recording_id, .. } => {
                format!("recording {} stopped", recording_id)
            }
            Self::RecordingUploaded { recording_id, url, .. } => {
                format!("recording {} uploaded to {}", recording_id, url)
            }
            Self::EncodingFailed {
                recording_id,
                message,
                ..
            } => {
                format!("encoding of {} failed: {}", recording_id, message)
            }
            Self::CompositionSwitched {
                broadcast_id,
                source_name,
                ..
            } => {
                format!("broadcast {} switched to {}", broadcast_id, source_name)
            }
            Self::BroadcastStalled { broadcast_id, .. } => {
                format!("broadcast {} has gone stale", broadcast_id)
            }
        }
    }

    /// Check if this event should be forwarded to the notification sink.
    pub fn should_notify(&self) -> bool {
        // Everything except the stall signal, which is operator-facing and
        // already logged; it still reaches channel subscribers.
        !matches!(self, Self::BroadcastStalled { .. })
    }
}

/// Broadcaster for lifecycle events.
pub struct EventBroadcaster {
    sender: broadcast::Sender<BroadcastEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with default capacity (256).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new broadcaster with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. A send error only means there are no subscribers;
    /// publishing never blocks or fails a transition.
    pub fn publish(&self, event: BroadcastEvent) {
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBroadcaster {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_subscribe() {
        let broadcaster = EventBroadcaster::new();
        let mut receiver = broadcaster.subscribe();

        broadcaster.publish(BroadcastEvent::BroadcastLive {
            broadcast_id: "b1".to_string(),
            timestamp: Utc::now(),
        });

        let received = receiver.try_recv().unwrap();
        assert!(matches!(received, BroadcastEvent::BroadcastLive { .. }));
        assert_eq!(received.broadcast_id(), "b1");
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let broadcaster = EventBroadcaster::new();
        broadcaster.publish(BroadcastEvent::BroadcastEnded {
            broadcast_id: "b1".to_string(),
            timestamp: Utc::now(),
        });
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_should_notify() {
        let stalled = BroadcastEvent::BroadcastStalled {
            broadcast_id: "b1".to_string(),
            last_ingest_at: None,
            timestamp: Utc::now(),
        };
        assert!(!stalled.should_notify());

        let live = BroadcastEvent::BroadcastLive {
            broadcast_id: "b1".to_string(),
            timestamp: Utc::now(),
        };
        assert!(live.should_notify());
        assert_eq!(live.event_name(), "broadcast_live");
    }

    #[test]
    fn test_description() {
        let event = BroadcastEvent::CompositionSwitched {
            broadcast_id: "b1".to_string(),
            source_name: "stage-left".to_string(),
            timestamp: Utc::now(),
        };
        assert!(event.description().contains("stage-left"));
    }
}
