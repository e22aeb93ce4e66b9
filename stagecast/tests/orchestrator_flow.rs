//! End-to-end lifecycle tests driving the orchestrator through ingest
//! events and operator commands, with fake subprocesses.

use std::sync::Arc;

use stagecast::Error;
use stagecast::config::AppConfig;
use stagecast::database;
use stagecast::domain::{BroadcastState, RecordingStatus};
use stagecast::ingest::IngestEvent;
use stagecast::orchestrator::BroadcastOrchestrator;
use stagecast::services::ServiceContainer;
use stagecast::testing::FakeLauncher;

struct Fixture {
    orchestrator: Arc<BroadcastOrchestrator>,
    launcher: Arc<FakeLauncher>,
    _media: tempfile::TempDir,
}

async fn setup() -> Fixture {
    let pool = database::init_pool("sqlite::memory:").await.unwrap();
    database::run_migrations(&pool).await.unwrap();

    let media = tempfile::tempdir().unwrap();
    let config = AppConfig {
        media_root: media.path().to_path_buf(),
        settle_delay: std::time::Duration::from_millis(1),
        ..AppConfig::default()
    };

    let launcher = Arc::new(FakeLauncher::new());
    let container = ServiceContainer::with_launcher(pool, config, launcher.clone());
    Fixture {
        orchestrator: container.orchestrator.clone(),
        launcher,
        _media: media,
    }
}

fn start(key: &str) -> IngestEvent {
    IngestEvent::SourceStart {
        ingest_key: key.to_string(),
    }
}

fn stop(key: &str) -> IngestEvent {
    IngestEvent::SourceStop {
        ingest_key: key.to_string(),
    }
}

#[tokio::test]
async fn test_full_broadcast_lifecycle() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("Launch day").await.unwrap();
    assert_eq!(broadcast.state, BroadcastState::Scheduled);

    // Source starts publishing: Live, recording and composition come up.
    let live = f
        .orchestrator
        .handle_ingest_event(start(&broadcast.ingest_key))
        .await
        .unwrap();
    assert_eq!(live.state, BroadcastState::Live);
    assert!(live.started_at.is_some());
    assert!(live.last_ingest_at.is_some());
    assert!(f.orchestrator.recording.is_recording(&broadcast.id));
    assert!(f.orchestrator.composition.is_running(&broadcast.id));

    // Source drops: Paused, capture keeps rolling.
    let paused = f
        .orchestrator
        .handle_ingest_event(stop(&broadcast.ingest_key))
        .await
        .unwrap();
    assert_eq!(paused.state, BroadcastState::Paused);
    assert!(paused.paused_at.is_some());
    assert!(f.orchestrator.recording.is_recording(&broadcast.id));

    // Source comes back: Live again, started_at unchanged, still one
    // recording session.
    let resumed = f
        .orchestrator
        .handle_ingest_event(start(&broadcast.ingest_key))
        .await
        .unwrap();
    assert_eq!(resumed.state, BroadcastState::Live);
    assert_eq!(resumed.started_at, live.started_at);
    let recordings = f.orchestrator.list_recordings(&broadcast.id).await.unwrap();
    assert_eq!(recordings.len(), 1);

    // Operator ends it: terminal, everything torn down, capture completed.
    let ended = f.orchestrator.end_broadcast(&broadcast.id).await.unwrap();
    assert_eq!(ended.state, BroadcastState::Ended);
    assert!(ended.ended_at.is_some());
    assert!(!f.orchestrator.recording.is_recording(&broadcast.id));
    assert!(!f.orchestrator.composition.is_running(&broadcast.id));

    let recordings = f.orchestrator.list_recordings(&broadcast.id).await.unwrap();
    assert_eq!(recordings.len(), 1);
    assert_ne!(recordings[0].status, RecordingStatus::Recording);
}

#[tokio::test]
async fn test_repeated_source_stop_keeps_first_paused_at() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("Panel").await.unwrap();

    f.orchestrator
        .handle_ingest_event(start(&broadcast.ingest_key))
        .await
        .unwrap();
    let first = f
        .orchestrator
        .handle_ingest_event(stop(&broadcast.ingest_key))
        .await
        .unwrap();
    let second = f
        .orchestrator
        .handle_ingest_event(stop(&broadcast.ingest_key))
        .await
        .unwrap();

    assert_eq!(second.state, BroadcastState::Paused);
    assert_eq!(second.paused_at, first.paused_at);
}

#[tokio::test]
async fn test_ingest_events_never_end_a_broadcast() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("Keynote").await.unwrap();

    f.orchestrator
        .handle_ingest_event(start(&broadcast.ingest_key))
        .await
        .unwrap();
    f.orchestrator.end_broadcast(&broadcast.id).await.unwrap();

    // Late webhooks against a terminal broadcast are acknowledged no-ops.
    let after_start = f
        .orchestrator
        .handle_ingest_event(start(&broadcast.ingest_key))
        .await
        .unwrap();
    assert_eq!(after_start.state, BroadcastState::Ended);

    let after_stop = f
        .orchestrator
        .handle_ingest_event(stop(&broadcast.ingest_key))
        .await
        .unwrap();
    assert_eq!(after_stop.state, BroadcastState::Ended);

    // No processes were restarted by the late events.
    assert!(!f.orchestrator.composition.is_running(&broadcast.id));
    assert!(!f.orchestrator.recording.is_recording(&broadcast.id));
}

#[tokio::test]
async fn test_end_twice_is_a_conflict() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("One-off").await.unwrap();

    f.orchestrator.end_broadcast(&broadcast.id).await.unwrap();
    let err = f.orchestrator.end_broadcast(&broadcast.id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_unknown_ingest_key_is_not_found() {
    let f = setup().await;
    let err = f
        .orchestrator
        .handle_ingest_event(start("no-such-key"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_camera_key_drives_owning_broadcast() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("Concert").await.unwrap();
    let camera = f
        .orchestrator
        .add_camera(&broadcast.id, "stage left")
        .await
        .unwrap();

    let live = f
        .orchestrator
        .handle_ingest_event(start(&camera.ingest_key))
        .await
        .unwrap();
    assert_eq!(live.id, broadcast.id);
    assert_eq!(live.state, BroadcastState::Live);
}

#[tokio::test]
async fn test_camera_switch_keeps_single_composition() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("Concert").await.unwrap();
    let cam_a = f
        .orchestrator
        .add_camera(&broadcast.id, "stage left")
        .await
        .unwrap();
    let cam_b = f
        .orchestrator
        .add_camera(&broadcast.id, "stage right")
        .await
        .unwrap();

    f.orchestrator
        .handle_ingest_event(start(&broadcast.ingest_key))
        .await
        .unwrap();

    f.orchestrator
        .switch_camera(&broadcast.id, &cam_a.id)
        .await
        .unwrap();
    let switched = f
        .orchestrator
        .switch_camera(&broadcast.id, &cam_b.id)
        .await
        .unwrap();
    assert!(switched.is_active);

    // One composition entry per broadcast, no matter how many switches.
    assert_eq!(
        f.orchestrator.composition.active_broadcasts(),
        vec![broadcast.id.clone()]
    );

    // Only one camera is active after the switches.
    let cameras = f.orchestrator.list_cameras(&broadcast.id).await.unwrap();
    let active: Vec<_> = cameras.iter().filter(|c| c.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, cam_b.id);
}

#[tokio::test]
async fn test_switch_rejects_foreign_camera() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("Show A").await.unwrap();
    let other = f.orchestrator.create_broadcast("Show B").await.unwrap();
    let foreign = f.orchestrator.add_camera(&other.id, "cam").await.unwrap();

    let err = f
        .orchestrator
        .switch_camera(&broadcast.id, &foreign.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_removing_active_camera_falls_back_to_primary() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("Concert").await.unwrap();
    let camera = f
        .orchestrator
        .add_camera(&broadcast.id, "stage left")
        .await
        .unwrap();

    f.orchestrator
        .handle_ingest_event(start(&broadcast.ingest_key))
        .await
        .unwrap();
    f.orchestrator
        .switch_camera(&broadcast.id, &camera.id)
        .await
        .unwrap();

    f.orchestrator
        .remove_camera(&broadcast.id, &camera.id)
        .await
        .unwrap();

    assert!(f.orchestrator.composition.is_running(&broadcast.id));
    let cameras = f.orchestrator.list_cameras(&broadcast.id).await.unwrap();
    assert!(cameras.is_empty());

    // Last spawned composition reads the broadcast's own ingest key.
    let last = f.launcher.spawned().pop().unwrap();
    let args = last.args.join(" ");
    assert!(args.contains(&broadcast.ingest_key));
}

#[tokio::test]
async fn test_operator_recording_controls() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("Rehearsal").await.unwrap();

    let recording = f.orchestrator.start_recording(&broadcast.id).await.unwrap();
    assert_eq!(recording.status, RecordingStatus::Recording);

    let err = f.orchestrator.start_recording(&broadcast.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyActive { .. }));

    let stopped = f.orchestrator.stop_recording(&broadcast.id).await.unwrap();
    assert_eq!(stopped.id, recording.id);
    assert_eq!(stopped.status, RecordingStatus::Completed);
}

#[tokio::test]
async fn test_recording_rejected_on_ended_broadcast() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("Done").await.unwrap();
    f.orchestrator.end_broadcast(&broadcast.id).await.unwrap();

    let err = f.orchestrator.start_recording(&broadcast.id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_end_broadcast_stops_mixer() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("DJ set").await.unwrap();

    f.orchestrator
        .handle_ingest_event(start(&broadcast.ingest_key))
        .await
        .unwrap();
    let mix = f.orchestrator.start_mix(&broadcast.id).await.unwrap();
    assert!(mix.is_active);
    assert!(f.orchestrator.mixer.is_running(&broadcast.id));

    f.orchestrator.end_broadcast(&broadcast.id).await.unwrap();

    assert!(!f.orchestrator.mixer.is_running(&broadcast.id));
    let mix = f.orchestrator.mixer.get(&broadcast.id).await.unwrap();
    assert!(!mix.is_active);
}

#[tokio::test]
async fn test_mixer_restarts_on_resume_when_session_active() {
    let f = setup().await;
    let broadcast = f.orchestrator.create_broadcast("DJ set").await.unwrap();

    f.orchestrator
        .handle_ingest_event(start(&broadcast.ingest_key))
        .await
        .unwrap();
    f.orchestrator.start_mix(&broadcast.id).await.unwrap();

    // Simulate an out-of-band mixer death.
    f.orchestrator.mixer.stop_all().await;
    // stop_all does not deactivate sessions; the persisted intent survives.
    assert!(!f.orchestrator.mixer.is_running(&broadcast.id));

    f.orchestrator
        .handle_ingest_event(stop(&broadcast.ingest_key))
        .await
        .unwrap();
    f.orchestrator
        .handle_ingest_event(start(&broadcast.ingest_key))
        .await
        .unwrap();

    assert!(f.orchestrator.mixer.is_running(&broadcast.id));
}

#[tokio::test]
async fn test_empty_title_rejected() {
    let f = setup().await;
    let err = f.orchestrator.create_broadcast("   ").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
