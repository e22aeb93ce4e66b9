//! HTTP surface tests: the ingest hook envelope and the operator routes,
//! driven through the full router without binding a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use stagecast::api::AppState;
use stagecast::api::routes::create_router;
use stagecast::config::AppConfig;
use stagecast::database;
use stagecast::services::ServiceContainer;
use stagecast::testing::FakeLauncher;

struct Fixture {
    router: Router,
    container: ServiceContainer,
    _media: tempfile::TempDir,
}

async fn setup() -> Fixture {
    let pool = database::init_pool("sqlite::memory:").await.unwrap();
    database::run_migrations(&pool).await.unwrap();

    let media = tempfile::tempdir().unwrap();
    let config = AppConfig {
        media_root: media.path().to_path_buf(),
        settle_delay: Duration::from_millis(1),
        ..AppConfig::default()
    };
    let container =
        ServiceContainer::with_launcher(pool.clone(), config, Arc::new(FakeLauncher::new()));
    let state = AppState::new(container.orchestrator.clone(), container.config.clone(), pool);

    Fixture {
        router: create_router(state),
        container,
        _media: media,
    }
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

#[tokio::test]
async fn test_on_publish_returns_success_envelope() {
    let fixture = setup().await;
    let broadcast = fixture
        .container
        .orchestrator
        .create_broadcast("Launch")
        .await
        .unwrap();

    let (status, body) = post_json(
        &fixture.router,
        "/hooks/on-publish",
        json!({"key": broadcast.ingest_key}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["broadcast_id"], broadcast.id.as_str());
    assert_eq!(body["state"], "LIVE");
}

#[tokio::test]
async fn test_legacy_hook_spellings_drive_the_same_transitions() {
    let fixture = setup().await;
    let broadcast = fixture
        .container
        .orchestrator
        .create_broadcast("Launch")
        .await
        .unwrap();
    let payload = json!({"key": broadcast.ingest_key});

    let (status, body) = post_json(&fixture.router, "/hooks/on_publish", payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["state"], "LIVE");

    let (status, body) = post_json(&fixture.router, "/hooks/on_publish_done", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["state"], "PAUSED");
}

#[tokio::test]
async fn test_unknown_key_gets_hook_error_envelope() {
    let fixture = setup().await;

    let (status, body) = post_json(
        &fixture.router,
        "/hooks/on-publish",
        json!({"key": "no-such-key"}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_missing_key_gets_hook_error_envelope() {
    let fixture = setup().await;

    let (status, body) = post_json(
        &fixture.router,
        "/hooks/on-publish-done",
        json!({"app": "live"}),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("ingest key"));
}

#[tokio::test]
async fn test_create_broadcast_route() {
    let fixture = setup().await;

    let (status, body) = post_json(
        &fixture.router,
        "/api/broadcasts",
        json!({"title": "Launch"}),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Launch");
    assert_eq!(body["state"], "SCHEDULED");
    assert!(!body["ingest_key"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_mix_config_route_on_unknown_broadcast_is_not_found() {
    let fixture = setup().await;

    let request = Request::builder()
        .method("PUT")
        .uri("/api/broadcasts/no-such-broadcast/mix/config")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"master_volume": 80, "music_volume": 40, "effects_volume": 60}).to_string(),
        ))
        .unwrap();
    let response = fixture.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "NOT_FOUND");
}
