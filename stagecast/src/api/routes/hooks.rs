//! Ingest webhook routes.
//!
//! The ingest server calls `on-publish` when a source starts sending video
//! and `on-publish-done` when it stops. Older ingest deployments used
//! underscores in the hook paths; both spellings are accepted.
//!
//! Hook responses follow the ingest server's contract rather than the
//! operator API envelope: `{"status":"success","broadcast_id":...}` on
//! success, `{"status":"error","message":...}` on failure.

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::models::HookResponse;
use crate::api::server::AppState;
use crate::ingest::{HookPayload, IngestEvent};

/// Create the hooks router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/on-publish", post(on_publish))
        .route("/on-publish-done", post(on_publish_done))
        // legacy spellings
        .route("/on_publish", post(on_publish))
        .route("/on_publish_done", post(on_publish_done))
}

/// Error wrapper that serializes in the ingest server's expected shape
/// while reusing the operator API's status-code mapping.
struct HookError(ApiError);

impl From<crate::Error> for HookError {
    fn from(err: crate::Error) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for HookError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "error",
            "message": self.0.message,
        });
        (self.0.status, Json(body)).into_response()
    }
}

/// A source started sending video.
async fn on_publish(
    State(state): State<AppState>,
    Json(payload): Json<HookPayload>,
) -> Result<Json<HookResponse>, HookError> {
    // Parse before any lookup; a malformed payload is the caller's error.
    let event = IngestEvent::source_start(payload)?;
    let broadcast = state.orchestrator.handle_ingest_event(event).await?;

    Ok(Json(HookResponse {
        status: "success".to_string(),
        broadcast_id: broadcast.id,
        state: broadcast.state.to_string(),
    }))
}

/// A source stopped sending video.
async fn on_publish_done(
    State(state): State<AppState>,
    Json(payload): Json<HookPayload>,
) -> Result<Json<HookResponse>, HookError> {
    let event = IngestEvent::source_stop(payload)?;
    let broadcast = state.orchestrator.handle_ingest_event(event).await?;

    Ok(Json(HookResponse {
        status: "success".to_string(),
        broadcast_id: broadcast.id,
        state: broadcast.state.to_string(),
    }))
}
