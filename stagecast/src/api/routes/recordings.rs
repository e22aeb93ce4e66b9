//! Recording lookup routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::api::error::ApiResult;
use crate::api::models::RecordingResponse;
use crate::api::server::AppState;

/// Create the recordings router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_recording))
}

async fn get_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordingResponse>> {
    let recording = state.orchestrator.recording.status(&id).await?;
    Ok(Json(RecordingResponse::from_entity(&recording)))
}
