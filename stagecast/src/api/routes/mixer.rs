//! Audio mix routes, nested under a broadcast.
//!
//! Mutations persist mix state; a running mixer keeps its baked-in volumes
//! until restarted, which the `running` field in responses makes visible.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};

use crate::api::error::ApiResult;
use crate::api::models::{BackgroundTrackRequest, MixConfigRequest, MixResponse, SoundEffectRequest};
use crate::api::server::AppState;
use crate::domain::{BackgroundTrack, SoundEffect};

/// Create the mixer router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/mix", get(get_mix))
        .route("/{id}/mix/start", post(start_mix))
        .route("/{id}/mix/stop", post(stop_mix))
        .route("/{id}/mix/config", put(update_config))
        .route("/{id}/mix/track", put(set_track).delete(clear_track))
        .route("/{id}/mix/effects", post(add_effect))
        .route("/{id}/mix/effects/{effect_id}", delete(clear_effect))
}

/// Top-level listing router, nested at `/api/mixes`.
pub fn listing_router() -> Router<AppState> {
    Router::new().route("/", get(list_mixes))
}

fn respond(state: &AppState, mix: crate::domain::AudioMixSession) -> Json<MixResponse> {
    let running = state.orchestrator.mixer.is_running(&mix.broadcast_id);
    Json(MixResponse::from_entity(&mix, running, &state.config))
}

/// All persisted mix sessions that are marked active, with their live
/// process status.
async fn list_mixes(State(state): State<AppState>) -> ApiResult<Json<Vec<MixResponse>>> {
    let mixes = state.orchestrator.mixer.list_active().await?;
    let responses = mixes
        .iter()
        .map(|mix| {
            let running = state.orchestrator.mixer.is_running(&mix.broadcast_id);
            MixResponse::from_entity(mix, running, &state.config)
        })
        .collect();
    Ok(Json(responses))
}

async fn get_mix(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MixResponse>> {
    let mix = state.orchestrator.mixer.get(&id).await?;
    Ok(respond(&state, mix))
}

async fn start_mix(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MixResponse>> {
    let mix = state.orchestrator.start_mix(&id).await?;
    Ok(respond(&state, mix))
}

async fn stop_mix(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MixResponse>> {
    state.orchestrator.stop_mix(&id).await?;
    let mix = state.orchestrator.mixer.get(&id).await?;
    Ok(respond(&state, mix))
}

async fn update_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MixConfigRequest>,
) -> ApiResult<Json<MixResponse>> {
    let mix = state
        .orchestrator
        .update_mix_config(&id, request.into_config())
        .await?;
    Ok(respond(&state, mix))
}

async fn set_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<BackgroundTrackRequest>,
) -> ApiResult<Json<MixResponse>> {
    let track = BackgroundTrack::new(request.track_id, request.volume);
    let mix = state.orchestrator.set_mix_track(&id, Some(track)).await?;
    Ok(respond(&state, mix))
}

async fn clear_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MixResponse>> {
    let mix = state.orchestrator.set_mix_track(&id, None).await?;
    Ok(respond(&state, mix))
}

async fn add_effect(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SoundEffectRequest>,
) -> ApiResult<Json<MixResponse>> {
    let effect = SoundEffect::new(request.effect_id, request.volume);
    let mix = state.orchestrator.add_mix_effect(&id, effect).await?;
    Ok(respond(&state, mix))
}

async fn clear_effect(
    State(state): State<AppState>,
    Path((id, effect_id)): Path<(String, String)>,
) -> ApiResult<Json<MixResponse>> {
    let mix = state
        .orchestrator
        .clear_mix_effect(&id, &effect_id)
        .await?;
    Ok(respond(&state, mix))
}
