//! Broadcast and camera routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};

use crate::api::error::ApiResult;
use crate::api::models::{
    AddCameraRequest, BroadcastResponse, CameraResponse, CreateBroadcastRequest, RecordingResponse,
};
use crate::api::server::AppState;

/// Create the broadcasts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_broadcast).get(list_broadcasts))
        .route("/{id}", get(get_broadcast))
        .route("/{id}/end", post(end_broadcast))
        .route("/{id}/cameras", post(add_camera).get(list_cameras))
        .route("/{id}/cameras/{camera_id}/activate", post(switch_camera))
        .route("/{id}/cameras/{camera_id}", delete(remove_camera))
        .route("/{id}/recording/start", post(start_recording))
        .route("/{id}/recording/stop", post(stop_recording))
        .route("/{id}/recordings", get(list_recordings))
}

async fn create_broadcast(
    State(state): State<AppState>,
    Json(request): Json<CreateBroadcastRequest>,
) -> ApiResult<(StatusCode, Json<BroadcastResponse>)> {
    let broadcast = state.orchestrator.create_broadcast(&request.title).await?;
    Ok((
        StatusCode::CREATED,
        Json(BroadcastResponse::from_entity(&broadcast, &state.config)),
    ))
}

async fn list_broadcasts(State(state): State<AppState>) -> ApiResult<Json<Vec<BroadcastResponse>>> {
    let broadcasts = state.orchestrator.list_broadcasts().await?;
    Ok(Json(
        broadcasts
            .iter()
            .map(|b| BroadcastResponse::from_entity(b, &state.config))
            .collect(),
    ))
}

async fn get_broadcast(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BroadcastResponse>> {
    let broadcast = state.orchestrator.get_broadcast(&id).await?;
    Ok(Json(BroadcastResponse::from_entity(&broadcast, &state.config)))
}

/// End a broadcast: terminal, tears down its processes, kicks off encoding.
async fn end_broadcast(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BroadcastResponse>> {
    let broadcast = state.orchestrator.end_broadcast(&id).await?;
    Ok(Json(BroadcastResponse::from_entity(&broadcast, &state.config)))
}

async fn add_camera(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AddCameraRequest>,
) -> ApiResult<(StatusCode, Json<CameraResponse>)> {
    let camera = state.orchestrator.add_camera(&id, &request.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(CameraResponse::from_entity(&camera, &state.config)),
    ))
}

async fn list_cameras(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<CameraResponse>>> {
    let cameras = state.orchestrator.list_cameras(&id).await?;
    Ok(Json(
        cameras
            .iter()
            .map(|c| CameraResponse::from_entity(c, &state.config))
            .collect(),
    ))
}

/// Switch the composited output to this camera's feed.
async fn switch_camera(
    State(state): State<AppState>,
    Path((id, camera_id)): Path<(String, String)>,
) -> ApiResult<Json<CameraResponse>> {
    let camera = state.orchestrator.switch_camera(&id, &camera_id).await?;
    Ok(Json(CameraResponse::from_entity(&camera, &state.config)))
}

async fn remove_camera(
    State(state): State<AppState>,
    Path((id, camera_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.orchestrator.remove_camera(&id, &camera_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<RecordingResponse>)> {
    let recording = state.orchestrator.start_recording(&id).await?;
    Ok((
        StatusCode::CREATED,
        Json(RecordingResponse::from_entity(&recording)),
    ))
}

async fn stop_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RecordingResponse>> {
    let recording = state.orchestrator.stop_recording(&id).await?;
    Ok(Json(RecordingResponse::from_entity(&recording)))
}

async fn list_recordings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<RecordingResponse>>> {
    let recordings = state.orchestrator.list_recordings(&id).await?;
    Ok(Json(
        recordings.iter().map(RecordingResponse::from_entity).collect(),
    ))
}
