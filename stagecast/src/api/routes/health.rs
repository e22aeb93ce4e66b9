//! Health check routes.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::api::error::ApiResult;
use crate::api::models::{ComponentHealth, HealthResponse};
use crate::api::server::AppState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let uptime = state.start_time.elapsed().as_secs();

    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            message: None,
        },
        Err(e) => ComponentHealth {
            name: "database".to_string(),
            status: "unhealthy".to_string(),
            message: Some(e.to_string()),
        },
    };

    let orchestrator = &state.orchestrator;
    let components = vec![
        database,
        ComponentHealth {
            name: "composition".to_string(),
            status: "healthy".to_string(),
            message: Some(format!(
                "{} active",
                orchestrator.composition.active_broadcasts().len()
            )),
        },
        ComponentHealth {
            name: "recording".to_string(),
            status: "healthy".to_string(),
            message: Some(format!(
                "{} active",
                orchestrator.recording.active_broadcasts().len()
            )),
        },
        ComponentHealth {
            name: "audio_mix".to_string(),
            status: "healthy".to_string(),
            message: Some(format!(
                "{} active",
                orchestrator.mixer.active_broadcasts().len()
            )),
        },
    ];

    let status = if components.iter().any(|c| c.status == "unhealthy") {
        "unhealthy"
    } else {
        "healthy"
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: uptime,
        components,
    }))
}

/// Readiness check - can the service take traffic? The database is the
/// only hard dependency.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready"),
    }
}

/// Liveness check - is the service alive?
async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "uptime_secs": uptime
        })),
    )
}
