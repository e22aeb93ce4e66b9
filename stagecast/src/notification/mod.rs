//! Outbound notifications.
//!
//! A detached task drains the event channel and forwards qualifying events
//! to an optional webhook sink. Delivery is fire-and-forget: failures are
//! logged and never reach the transition path.

pub mod events;

pub use events::{BroadcastEvent, EventBroadcaster};

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-request timeout for webhook delivery.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Forwards lifecycle events to a webhook sink.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Spawn the notifier task. Returns immediately; the task runs until the
    /// broadcaster is dropped or the token is cancelled.
    pub fn spawn(self, broadcaster: &EventBroadcaster, cancel_token: CancellationToken) {
        let mut receiver = broadcaster.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("webhook notifier shutting down");
                        break;
                    }
                    result = receiver.recv() => {
                        match result {
                            Ok(event) => {
                                if event.should_notify() {
                                    self.deliver(&event).await;
                                }
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                                warn!(missed, "notifier lagged behind event channel");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });
    }

    async fn deliver(&self, event: &BroadcastEvent) {
        let payload = serde_json::json!({
            "event": event.event_name(),
            "broadcast_id": event.broadcast_id(),
            "description": event.description(),
            "data": event,
        });

        let result = self
            .client
            .post(&self.url)
            .timeout(DELIVERY_TIMEOUT)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(event = event.event_name(), "notification delivered");
            }
            Ok(response) => {
                // Swallowed on purpose: notification failure never rolls back
                // the state change it describes.
                warn!(
                    event = event.event_name(),
                    status = %response.status(),
                    "notification sink rejected event"
                );
            }
            Err(e) => {
                warn!(event = event.event_name(), error = %e, "notification delivery failed");
            }
        }
    }
}
