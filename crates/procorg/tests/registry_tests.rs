//! Integration tests for the process registry.

#![cfg(unix)]

use procorg::{MemoryLogger, ProcessRegistry, RegistryConfig, SpawnOptions};
use std::time::{Duration, Instant};

fn registry() -> (ProcessRegistry, MemoryLogger) {
    let logger = MemoryLogger::new();
    (ProcessRegistry::new().with_logger(logger.clone()), logger)
}

/// Poll `is_running` until the child exits, failing after five seconds.
async fn wait_until_exited(registry: &mut ProcessRegistry, name: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while registry.is_running(name) {
        assert!(Instant::now() < deadline, "{} did not exit in time", name);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_unknown_names_report_not_found() {
    let (mut registry, logger) = registry();

    assert!(!registry.is_running("ghost"));
    assert_eq!(registry.get_output("ghost").await, None);
    assert_eq!(registry.get_pid("ghost"), None);
    assert_eq!(registry.destroy("ghost").await, None);
    assert!(registry.get("ghost").is_none());

    let warnings = logger.warnings();
    assert_eq!(warnings.len(), 4);
    assert!(warnings.iter().all(|w| w.contains("ghost")));
    assert!(logger.errors().is_empty());
}

#[tokio::test]
async fn test_created_name_is_listed_once() {
    let (mut registry, _) = registry();

    registry
        .create(["sleep", "5"], "x", SpawnOptions::new())
        .await
        .expect("sleep is launchable");

    let children = registry.get_children();
    assert_eq!(children.iter().filter(|name| *name == "x").count(), 1);

    registry.destroy("x").await;
}

#[tokio::test]
async fn test_destroy_twice_second_is_not_found() {
    let (mut registry, logger) = registry();

    registry
        .create(["sleep", "5"], "x", SpawnOptions::new())
        .await
        .expect("sleep is launchable");

    registry.destroy("x").await;
    assert!(!registry.get_children().contains(&"x".to_string()));

    assert_eq!(registry.destroy("x").await, None);
    assert_eq!(logger.warnings().len(), 1);
}

#[tokio::test]
async fn test_echo_output_is_retrieved_once() {
    let (mut registry, _) = registry();

    registry
        .create(["echo", "hello"], "e1", SpawnOptions::new().capture_output(true))
        .await
        .expect("echo is launchable");
    wait_until_exited(&mut registry, "e1").await;

    assert_eq!(registry.get_output("e1").await.as_deref(), Some("hello\n"));
    assert_eq!(registry.get_output("e1").await.as_deref(), Some(""));

    registry.destroy("e1").await;
    assert!(!registry.get_children().contains(&"e1".to_string()));
}

#[tokio::test]
async fn test_exact_bytes_are_captured() {
    let (mut registry, _) = registry();

    registry
        .create(
            ["printf", "line one\\nline two\\n"],
            "p",
            SpawnOptions::new().blocking(true).capture_output(true),
        )
        .await
        .expect("printf is launchable");

    assert_eq!(
        registry.get_output("p").await.as_deref(),
        Some("line one\nline two\n")
    );
    registry.destroy("p").await;
}

#[tokio::test]
async fn test_uncaptured_output_is_never_available() {
    let (mut registry, logger) = registry();

    registry
        .create(["sleep", "0.3"], "quiet", SpawnOptions::new())
        .await
        .expect("sleep is launchable");

    // Still running: a warning, no output.
    assert_eq!(registry.get_output("quiet").await, None);
    assert_eq!(logger.warnings().len(), 1);

    wait_until_exited(&mut registry, "quiet").await;
    assert_eq!(registry.get_output("quiet").await, None);
    assert_eq!(registry.get_output("quiet").await, None);
    assert_eq!(registry.destroy("quiet").await, None);
}

#[tokio::test]
async fn test_get_output_while_running_does_not_wait() {
    let (mut registry, logger) = registry();

    registry
        .create(["sleep", "5"], "slow", SpawnOptions::new().capture_output(true))
        .await
        .expect("sleep is launchable");

    let started = Instant::now();
    assert_eq!(registry.get_output("slow").await, None);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(logger.warnings()[0].contains("still running"));

    assert_eq!(registry.destroy("slow").await.as_deref(), Some(""));
}

#[tokio::test]
async fn test_get_output_ignores_grandchild_holding_stdout() {
    let (mut registry, _) = registry();

    registry
        .create(
            ["sh", "-c", "echo hi; sleep 4 &"],
            "parent",
            SpawnOptions::new().capture_output(true),
        )
        .await
        .expect("sh is launchable");
    wait_until_exited(&mut registry, "parent").await;

    let started = Instant::now();
    assert_eq!(registry.get_output("parent").await.as_deref(), Some("hi\n"));
    assert!(started.elapsed() < Duration::from_secs(1));

    let started = Instant::now();
    assert_eq!(registry.destroy("parent").await, None);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_destroy_with_grace_ignores_grandchild_holding_stdout() {
    let logger = MemoryLogger::new();
    let mut registry = ProcessRegistry::new()
        .with_logger(logger.clone())
        .with_config(
            RegistryConfig::default().with_termination_grace(Duration::from_millis(200)),
        );

    registry
        .create(
            ["sh", "-c", "echo hi; sleep 4 & exec sleep 30"],
            "parent",
            SpawnOptions::new().capture_output(true),
        )
        .await
        .expect("sh is launchable");

    // Let the echo land before the shell is replaced by sleep.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    assert_eq!(registry.destroy("parent").await.as_deref(), Some("hi\n"));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(registry.is_empty());
    assert!(logger.errors().is_empty());
}

#[tokio::test]
async fn test_is_running_transitions_to_false() {
    let (mut registry, _) = registry();

    registry
        .create(["sleep", "0.2"], "short", SpawnOptions::new())
        .await
        .expect("sleep is launchable");

    assert!(registry.is_running("short"));
    wait_until_exited(&mut registry, "short").await;
    assert!(!registry.is_running("short"));

    // Exited but not destroyed: still listed and still has a pid.
    assert_eq!(registry.get_children(), vec!["short"]);
    assert!(registry.get_pid("short").is_some());

    registry.destroy("short").await;
}

#[tokio::test]
async fn test_pid_matches_spawned_process() {
    let (mut registry, _) = registry();

    let pid = registry
        .create(["sleep", "5"], "s", SpawnOptions::new())
        .await
        .map(|tracked| tracked.pid())
        .expect("sleep is launchable");

    assert!(pid > 0);
    assert_eq!(registry.get_pid("s"), Some(pid));

    registry.destroy("s").await;

    // Still reported after the child has been reaped.
    registry
        .create(["true"], "t", SpawnOptions::new().blocking(true))
        .await
        .expect("true is launchable");
    let reaped = registry.get_pid("t");
    assert!(!registry.is_running("t"));
    assert_eq!(registry.get_pid("t"), reaped);
    registry.destroy("t").await;
}

#[tokio::test]
async fn test_sleep_scenario_destroy_blocks_until_terminated() {
    let (mut registry, _) = registry();

    registry
        .create(["sleep", "5"], "s1", SpawnOptions::new())
        .await
        .expect("sleep is launchable");
    assert!(registry.is_running("s1"));

    let started = Instant::now();
    assert_eq!(registry.destroy("s1").await, None);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(registry.get_children().is_empty());
}

#[tokio::test]
async fn test_missing_binary_is_not_tracked() {
    let (mut registry, logger) = registry();

    let created = registry
        .create(["no-such-binary"], "bad", SpawnOptions::new())
        .await;

    assert!(created.is_none());
    assert!(!registry.get_children().contains(&"bad".to_string()));

    let errors = logger.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("bad"));
    assert!(errors[0].contains("no-such-binary"));
}

#[tokio::test]
async fn test_kill_all_keeps_records() {
    let (mut registry, _) = registry();

    registry
        .create(["sleep", "5"], "a", SpawnOptions::new())
        .await
        .expect("sleep is launchable");
    registry
        .create(["sleep", "5"], "b", SpawnOptions::new())
        .await
        .expect("sleep is launchable");

    registry.kill_all();

    let deadline = Instant::now() + Duration::from_secs(5);
    while registry.is_running("a") || registry.is_running("b") {
        assert!(Instant::now() < deadline, "kill_all did not stop both children");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!registry.is_running("a"));
    assert!(!registry.is_running("b"));
    assert_eq!(registry.get_children(), vec!["a", "b"]);

    registry.destroy("a").await;
    registry.destroy("b").await;
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_children_are_listed_in_insertion_order() {
    let (mut registry, _) = registry();

    for name in ["third", "first", "second"] {
        registry
            .create(["true"], name, SpawnOptions::new().blocking(true))
            .await
            .expect("true is launchable");
    }
    assert_eq!(registry.get_children(), vec!["third", "first", "second"]);

    registry.destroy("first").await;
    assert_eq!(registry.get_children(), vec!["third", "second"]);

    registry.destroy("third").await;
    registry.destroy("second").await;
}

#[tokio::test]
async fn test_tracked_process_reports_creation_flags() {
    let (mut registry, _) = registry();

    let tracked = registry
        .create(
            ["sh", "-c", "exit 3"],
            "flags",
            SpawnOptions::new().blocking(true).capture_output(true),
        )
        .await
        .expect("sh is launchable");

    assert_eq!(tracked.name(), "flags");
    assert!(tracked.is_blocking());
    assert!(tracked.captures_output());
    assert_eq!(tracked.command().to_string(), "sh -c \"exit 3\"");
    assert_eq!(tracked.exit_status().and_then(|status| status.code()), Some(3));

    registry.destroy("flags").await;
}

#[tokio::test]
#[cfg(target_os = "linux")]
async fn test_kill_on_drop_config_reaches_children() {
    let logger = MemoryLogger::new();
    let pid = {
        let mut registry = ProcessRegistry::new()
            .with_logger(logger.clone())
            .with_config(RegistryConfig::default().with_kill_on_drop(true));

        registry
            .create(["sleep", "30"], "orphan", SpawnOptions::new())
            .await
            .map(|tracked| tracked.pid())
            .expect("sleep is launchable")
    };

    // Registry dropped: the child must be gone shortly after.
    let deadline = Instant::now() + Duration::from_secs(5);
    let proc_path = format!("/proc/{}/stat", pid);
    loop {
        let alive = std::fs::read_to_string(&proc_path)
            .map(|stat| !stat.contains(") Z "))
            .unwrap_or(false);
        if !alive {
            break;
        }
        assert!(Instant::now() < deadline, "child survived registry drop");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(logger.records().is_empty());
}
