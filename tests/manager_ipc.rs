mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use common::{settle, Harness, LaunchBehavior, RecordingNotifier, TERMINAL};
use quakeland::config::{SettingKey, SettingValue, SettingsStore};
use quakeland::core::hot_reload::HotReloadManager;
use quakeland::ipc::{send_message, ClientMessage, DaemonResponse, IpcServer};
use quakeland::{AppState, QuakeError, QuakeModeManager};

#[tokio::test(start_paused = true)]
async fn test_unconfigured_slot_is_rejected() {
    let harness = Harness::new();
    let manager = QuakeModeManager::new(harness.host.clone());

    assert_eq!(manager.toggle(4).await, Err(QuakeError::UnknownSlot(4)));
    assert!(manager.status().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slot_instance_is_reused_between_toggles() {
    let harness = Harness::new();
    let manager = QuakeModeManager::new(harness.host.clone());

    manager.toggle(1).await.unwrap();
    manager.toggle(1).await.unwrap();
    manager.toggle(1).await.unwrap();

    assert_eq!(harness.terminal().open_requests(), 1);
    let status = manager.status();
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].slot, 1);
    assert_eq!(status[0].app_id, TERMINAL);
    assert_eq!(status[0].state, AppState::Running);
    assert!(status[0].window.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_dead_instance_is_replaced_on_next_toggle() {
    let harness = Harness::new();
    let manager = QuakeModeManager::new(harness.host.clone());

    manager.toggle(1).await.unwrap();
    let first = harness.terminal().last_window().unwrap();
    first.close();
    settle().await;
    assert_eq!(manager.get(1).unwrap().state(), AppState::Dead);

    manager.toggle(1).await.unwrap();
    assert_eq!(harness.terminal().open_requests(), 2);
    assert_eq!(manager.get(1).unwrap().state(), AppState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_rebinding_a_slot_switches_application() {
    let harness = Harness::new();
    let editor = harness.add_app("editor", LaunchBehavior::Open(Duration::from_millis(30)));
    let manager = QuakeModeManager::new(harness.host.clone());

    manager.toggle(1).await.unwrap();
    let old = manager.get(1).unwrap();

    harness
        .settings
        .set(SettingKey::App(1), SettingValue::String("editor".to_string()))
        .unwrap();
    manager.toggle(1).await.unwrap();

    assert_eq!(old.state(), AppState::Dead);
    assert_eq!(editor.open_requests(), 1);
    assert_eq!(manager.get(1).unwrap().app_id(), "editor");
}

#[tokio::test(start_paused = true)]
async fn test_failed_launch_leaves_dead_instance() {
    let harness = Harness::new();
    harness.terminal().set_behavior(LaunchBehavior::Hang);
    let manager = QuakeModeManager::new(harness.host.clone());

    let err = manager.toggle(1).await.unwrap_err();
    assert!(matches!(err, QuakeError::LaunchTimeout { .. }));
    assert_eq!(manager.status()[0].state, AppState::Dead);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_all_kills_every_instance() {
    let harness = Harness::new();
    harness.add_app("editor", LaunchBehavior::Open(Duration::from_millis(30)));
    harness
        .settings
        .set(SettingKey::App(2), SettingValue::String("editor".to_string()))
        .unwrap();
    let manager = QuakeModeManager::new(harness.host.clone());

    let launches = futures::future::join_all([manager.toggle(1), manager.toggle(2)]).await;
    for result in launches {
        tokio_test::assert_ok!(result);
    }
    assert_eq!(harness.terminal().open_requests(), 1);
    let instances = [manager.get(1).unwrap(), manager.get(2).unwrap()];

    manager.destroy_all();
    settle().await;

    assert!(instances.iter().all(|app| app.state() == AppState::Dead));
    assert!(manager.status().is_empty());
    assert_eq!(harness.settings.changes().subscriber_count(), 0);
}

struct Fixture {
    harness: Harness,
    notifier: Arc<RecordingNotifier>,
    server: Arc<IpcServer>,
    _config: tempfile::NamedTempFile,
}

fn fixture(socket: Option<String>) -> Fixture {
    let harness = Harness::new();
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[quake_mode]\nwidth = 90\n\n[apps]\n1 = \"{TERMINAL}\"").unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let hot_reload = Arc::new(HotReloadManager::new(
        config.path(),
        harness.settings.clone(),
    ));
    let mut server = IpcServer::new(
        Arc::new(QuakeModeManager::new(harness.host.clone())),
        harness.settings.clone(),
        hot_reload,
        notifier.clone(),
    );
    if let Some(socket) = socket {
        server = server.with_socket_path(socket);
    }

    Fixture {
        harness,
        notifier,
        server: Arc::new(server),
        _config: config,
    }
}

#[tokio::test(start_paused = true)]
async fn test_ipc_toggle_failure_notifies() {
    let fixture = fixture(None);
    fixture.harness.terminal().set_behavior(LaunchBehavior::Fail);

    let response = fixture
        .server
        .process_message(ClientMessage::Toggle { slot: 1 })
        .await;

    assert!(matches!(response, DaemonResponse::Error { .. }));
    let messages = fixture.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("terminal"));
}

#[tokio::test(start_paused = true)]
async fn test_ipc_unknown_slot_is_not_notified() {
    let fixture = fixture(None);

    let response = fixture
        .server
        .process_message(ClientMessage::Toggle { slot: 9 })
        .await;

    assert_eq!(
        response,
        DaemonResponse::Error {
            message: "no application configured for slot 9".to_string()
        }
    );
    assert!(fixture.notifier.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ipc_list_and_monitor() {
    let fixture = fixture(None);

    assert_eq!(
        fixture.server.process_message(ClientMessage::List).await,
        DaemonResponse::List {
            items: vec![format!("1: {TERMINAL}")]
        }
    );

    let response = fixture
        .server
        .process_message(ClientMessage::SetMonitor { index: 2 })
        .await;
    assert!(matches!(response, DaemonResponse::Success { .. }));
    assert_eq!(fixture.harness.settings.get_int(SettingKey::Monitor), 2);
}

#[tokio::test]
async fn test_ipc_reload_applies_config_file() {
    let fixture = fixture(None);

    let response = fixture.server.process_message(ClientMessage::Reload).await;
    assert!(matches!(response, DaemonResponse::Success { .. }));
    assert_eq!(fixture.harness.settings.get_int(SettingKey::Width), 90);
}

#[tokio::test]
async fn test_ipc_status_over_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("quakeland.sock").to_string_lossy().into_owned();
    let fixture = fixture(Some(socket.clone()));

    let serving = tokio::spawn(fixture.server.clone().start());
    for _ in 0..100 {
        if std::path::Path::new(&socket).exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    match send_message(&socket, &ClientMessage::Status).await.unwrap() {
        DaemonResponse::Status {
            version, instances, ..
        } => {
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
            assert!(instances.is_empty());
        }
        other => panic!("unexpected response {other:?}"),
    }

    serving.abort();
    fixture.server.cleanup();
    assert!(!std::path::Path::new(&socket).exists());
}
