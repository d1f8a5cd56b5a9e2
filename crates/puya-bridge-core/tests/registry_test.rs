//! Session registry behaviour against faked collaborators

mod common;

use common::{FakeEnvironment, FakeProber, Harness, folder};
use puya_bridge_core::{BridgeConfig, FolderSettings, RuntimeEnvironment, StartOutcome};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_concurrent_starts_register_one_session() {
    let harness = Harness::new(
        BridgeConfig::default(),
        FakeEnvironment::with(
            Some(RuntimeEnvironment::new("/env", "/env/bin/python")),
            Duration::from_millis(50),
        ),
        FakeProber::new(&["/env/bin/python"]),
    );
    let app = folder("app");

    let (a, b, c) = tokio::join!(
        harness.registry.start_session(&app),
        harness.registry.start_session(&app),
        harness.registry.start_session(&app),
    );

    let started = [&a, &b, &c]
        .iter()
        .filter(|o| matches!(o, StartOutcome::Started { .. }))
        .count();
    assert_eq!(started, 1);
    assert!(a.is_running() && b.is_running() && c.is_running());
    assert_eq!(a.session(), b.session());
    assert_eq!(harness.connector.connects(), 1);
    assert_eq!(harness.registry.len().await, 1);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let harness = Harness::python();
    let app = folder("app");

    let first = harness.registry.start_session(&app).await;
    let second = harness.registry.start_session(&app).await;

    assert!(matches!(first, StartOutcome::Started { .. }));
    assert!(matches!(second, StartOutcome::AlreadyRunning { .. }));
    assert_eq!(first.session(), second.session());
    assert_eq!(harness.connector.connects(), 1);
    // The environment is not consulted again for a running folder
    assert_eq!(harness.environment.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_crashed_server_is_relaunched_on_next_start() {
    let harness = Harness::python();
    let app = folder("app");

    let first = harness.registry.start_session(&app).await;
    harness.connector.crash("app");
    assert!(!harness.registry.session_info().await[0].connected);

    let second = harness.registry.start_session(&app).await;

    assert!(matches!(second, StartOutcome::Started { .. }));
    assert_ne!(first.session(), second.session());
    assert_eq!(
        harness.connector.events(),
        vec!["connect:app", "stop:app", "connect:app"]
    );
    let info = harness.registry.session_info().await;
    assert_eq!(info.len(), 1);
    assert!(info[0].connected);
}

#[tokio::test]
async fn test_different_folders_start_independently() {
    let harness = Harness::python();
    let app = folder("app");
    let lib = folder("lib");

    let (a, b) = tokio::join!(
        harness.registry.start_session(&app),
        harness.registry.start_session(&lib),
    );

    assert!(a.is_running() && b.is_running());
    assert_ne!(a.session(), b.session());
    assert_eq!(harness.registry.folders().await, vec!["app", "lib"]);
}

#[tokio::test]
async fn test_restart_stops_old_before_new() {
    let harness = Harness::python();
    let app = folder("app");

    let first = harness.registry.start_session(&app).await;
    let second = harness.registry.restart_session(&app).await;

    assert!(matches!(second, StartOutcome::Started { .. }));
    assert_ne!(first.session(), second.session());
    assert_eq!(
        harness.connector.events(),
        vec!["connect:app", "stop:app", "connect:app"]
    );
    assert_eq!(harness.registry.len().await, 1);

    let info = harness.registry.session_info().await;
    assert_eq!(Some(info[0].id), second.session());
}

#[tokio::test]
async fn test_restart_without_session_starts() {
    let harness = Harness::python();
    let outcome = harness.registry.restart_session(&folder("app")).await;

    assert!(matches!(outcome, StartOutcome::Started { .. }));
    assert_eq!(harness.connector.events(), vec!["connect:app"]);
}

#[tokio::test]
async fn test_stop_all_tolerates_failures() {
    let harness = Harness::python();
    harness
        .connector
        .failing_shutdown
        .lock()
        .unwrap()
        .insert("lib".to_string());

    for name in ["app", "lib", "tools"] {
        assert!(harness.registry.start_session(&folder(name)).await.is_running());
    }
    assert_eq!(harness.registry.len().await, 3);

    harness.registry.stop_all().await;

    assert!(harness.registry.is_empty().await);
    let mut stops: Vec<String> = harness
        .connector
        .events()
        .into_iter()
        .filter(|e| e.starts_with("stop:"))
        .collect();
    stops.sort();
    assert_eq!(stops, vec!["stop:app", "stop:lib", "stop:tools"]);
}

#[tokio::test]
async fn test_missing_environment_is_silent() {
    let harness = Harness::new(
        BridgeConfig::default(),
        FakeEnvironment::with(None, Duration::ZERO),
        FakeProber::new(&["puyapy-lsp"]),
    );

    let outcome = harness.registry.start_session(&folder("app")).await;

    assert_eq!(outcome, StartOutcome::EnvironmentUnavailable);
    assert!(harness.notifier.messages().is_empty());
    assert!(harness.prober.calls().is_empty());
    assert_eq!(harness.connector.connects(), 0);
}

#[tokio::test]
async fn test_partial_environment_is_not_enough() {
    let harness = Harness::new(
        BridgeConfig::default(),
        FakeEnvironment::with(
            Some(RuntimeEnvironment {
                env_path: None,
                executable: Some(PathBuf::from("/usr/bin/python3")),
                id: None,
            }),
            Duration::ZERO,
        ),
        FakeProber::new(&["puyapy-lsp"]),
    );

    let outcome = harness.registry.start_session(&folder("app")).await;
    assert_eq!(outcome, StartOutcome::EnvironmentUnavailable);
}

#[tokio::test]
async fn test_environment_change_allows_later_start() {
    let harness = Harness::new(
        BridgeConfig::default(),
        FakeEnvironment::with(None, Duration::ZERO),
        FakeProber::new(&["/env/bin/python"]),
    );
    let app = folder("app");

    assert_eq!(
        harness.registry.start_session(&app).await,
        StartOutcome::EnvironmentUnavailable
    );

    harness
        .environment
        .set(Some(RuntimeEnvironment::new("/env", "/env/bin/python")));
    assert!(harness.registry.restart_session(&app).await.is_running());
}

#[tokio::test]
async fn test_no_strategy_reports_error() {
    let harness = Harness::new(
        BridgeConfig::default(),
        FakeEnvironment::python(),
        FakeProber::new(&[]),
    );

    let outcome = harness.registry.start_session(&folder("app")).await;

    assert_eq!(outcome, StartOutcome::StrategyUnavailable);
    assert_eq!(
        harness.notifier.errors(),
        vec![
            "Algorand Python Language Server is not installed or not available in the current \
             environment."
                .to_string()
        ]
    );
    assert!(!harness.registry.contains("app").await);
}

#[tokio::test]
async fn test_start_failure_leaves_registry_clean() {
    let harness = Harness::python();
    harness.connector.fail_connect.store(true, Ordering::SeqCst);
    let app = folder("app");

    let outcome = harness.registry.start_session(&app).await;
    assert!(matches!(outcome, StartOutcome::StartFailed { .. }));
    assert_eq!(
        harness.notifier.errors(),
        vec!["Failed to start the Algorand Python Language Server.".to_string()]
    );
    assert!(harness.registry.is_empty().await);

    harness.connector.fail_connect.store(false, Ordering::SeqCst);
    assert!(matches!(
        harness.registry.start_session(&app).await,
        StartOutcome::Started { .. }
    ));
}

#[tokio::test]
async fn test_probe_falls_back_to_standalone_command() {
    let harness = Harness::new(
        BridgeConfig::default(),
        FakeEnvironment::python(),
        FakeProber::new(&["puyapy-lsp"]),
    );

    harness.registry.start_session(&folder("app")).await;

    let plan = harness.connector.last_plan().unwrap();
    assert_eq!(plan.strategy.command, "puyapy-lsp");
    assert!(plan.strategy.args.is_none());
    assert_eq!(plan.env.get("VIRTUAL_ENV").map(String::as_str), Some("/env"));
}

#[tokio::test]
async fn test_module_strategy_drops_probe_flag() {
    let harness = Harness::python();
    harness.registry.start_session(&folder("app")).await;

    let plan = harness.connector.last_plan().unwrap();
    assert_eq!(plan.strategy.command, "/env/bin/python");
    assert_eq!(plan.strategy.args(), ["-m", "puyapy.lsp"]);
}

#[tokio::test]
async fn test_override_path_skips_probes() {
    let mut config = BridgeConfig::default();
    config.folders.insert(
        "app".to_string(),
        FolderSettings::default().with_language_server_path("${workspaceFolder}/.puya"),
    );
    let harness = Harness::new(config, FakeEnvironment::python(), FakeProber::new(&[]));

    let outcome = harness.registry.start_session(&folder("app")).await;

    assert!(outcome.is_running());
    assert!(harness.prober.calls().is_empty());
    let plan = harness.connector.last_plan().unwrap();
    assert_eq!(plan.strategy.command, "puyapy-lsp");
    assert_eq!(plan.strategy.cwd, Some(PathBuf::from("/work/app/.puya")));
}

#[tokio::test]
async fn test_removed_folder_can_be_started_again() {
    let harness = Harness::python();
    let app = folder("app");

    let first = harness.registry.start_session(&app).await;
    assert!(harness.registry.remove_folder("app").await);
    assert!(!harness.registry.contains("app").await);

    let second = harness.registry.start_session(&app).await;
    assert!(matches!(second, StartOutcome::Started { .. }));
    assert!(second.session() > first.session());
}

#[tokio::test]
async fn test_restart_during_start_waits_for_it() {
    let harness = Harness::python();
    *harness.connector.connect_delay.lock().unwrap() = Duration::from_millis(50);
    let app = folder("app");

    let (started, restarted) = tokio::join!(harness.registry.start_session(&app), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        harness.registry.restart_session(&app).await
    });

    assert!(started.is_running() && restarted.is_running());
    assert_ne!(started.session(), restarted.session());
    assert_eq!(
        harness.connector.events(),
        vec!["connect:app", "stop:app", "connect:app"]
    );
    assert_eq!(harness.registry.len().await, 1);
}
