//! API route modules.
//!
//! Organizes routes by resource type.

pub mod broadcasts;
pub mod health;
pub mod hooks;
pub mod mixer;
pub mod recordings;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/hooks", hooks::router())
        .nest("/api/broadcasts", broadcasts::router().merge(mixer::router()))
        .nest("/api/recordings", recordings::router())
        .nest("/api/mixes", mixer::listing_router())
        .nest("/health", health::router())
        .with_state(state)
}
