//! Integration tests for registration, status reads, and launch failures.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use spawn_kit::LaunchError;
use warden::{ProcessSpec, ProcessState, Supervisor, SupervisorConfig, SupervisorError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spec running an inline shell script in `dir`.
fn sh(dir: &Path, name: &str, script: &str) -> ProcessSpec {
    let mut spec = ProcessSpec::new(name, "sh");
    spec.args = vec!["-c".to_string(), script.to_string()];
    spec.working_dir = dir.to_path_buf();
    spec
}

/// Write an executable script into `dir` and return a spec invoking it
/// through its relative path.
fn script(dir: &Path, name: &str, file: &str, body: &str) -> ProcessSpec {
    let path = dir.join(file);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("make script executable");

    let mut spec = ProcessSpec::new(name, format!("./{file}"));
    spec.working_dir = dir.to_path_buf();
    spec
}

// ---------------------------------------------------------------------------
// 1. Starting and observing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_reaches_running_with_a_pid() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    let handle = supervisor
        .start(sh(dir.path(), "sleeper", "sleep 5"))
        .await
        .expect("start should succeed");

    let snap = handle.snapshot();
    assert_eq!(snap.state, ProcessState::Running);
    assert!(snap.pid.is_some());
    assert!(snap.last_started_at.is_some());
    assert_eq!(snap.restart_count, 0);

    supervisor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn clean_exit_without_autorestart_lands_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    let mut handle = supervisor
        .start(sh(dir.path(), "oneshot", "true"))
        .await
        .expect("start should succeed");

    let snap = handle
        .wait_for_state(ProcessState::Stopped)
        .await
        .expect("process should settle");
    assert_eq!(snap.exit.expect("exit recorded").code, Some(0));
    assert_eq!(snap.restart_count, 0);
    assert!(snap.pid.is_none());
}

#[tokio::test]
async fn crash_without_autorestart_lands_crashed_permanently() {
    // A manager-style record: relative script, merged logs, no autorestart.
    let dir = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    let mut spec = script(dir.path(), "bot", "run.sh", "echo booting\nexit 1");
    spec.merge_logs = true;
    spec.stdout_path = Some(logs.path().join("bot.log"));

    let mut handle = supervisor.start(spec).await.expect("start should succeed");

    let snap = handle
        .wait_for_state(ProcessState::Crashed)
        .await
        .expect("process should crash");
    assert_eq!(snap.exit.expect("exit recorded").code, Some(1));
    assert_eq!(snap.restart_count, 0);
    assert!(snap.is_terminated());

    // Still crashed after a beat; nothing relaunches it.
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert_eq!(handle.snapshot().state, ProcessState::Crashed);
}

#[tokio::test]
async fn abnormal_exit_code_is_reported_on_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    let mut handle = supervisor
        .start(sh(dir.path(), "failing", "exit 3"))
        .await
        .expect("start should succeed");

    let snap = handle
        .wait_for_state(ProcessState::Crashed)
        .await
        .expect("process should crash");
    let exit = snap.exit.expect("exit recorded");
    assert_eq!(exit.code, Some(3));
    assert_eq!(exit.signal, None);
    assert!(snap.last_exited_at.is_some());
}

#[tokio::test]
async fn changed_streams_snapshot_updates() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    let mut handle = supervisor
        .start(sh(dir.path(), "oneshot", "true"))
        .await
        .expect("start should succeed");

    let mut last = handle.snapshot().state;
    while last != ProcessState::Stopped {
        last = handle.changed().await.expect("monitor alive").state;
    }
    assert_eq!(last, ProcessState::Stopped);
}

#[tokio::test]
async fn zero_poll_interval_leaves_the_monitor_responsive() {
    // Zero is representable in the config; an unwatched process must keep
    // supervising under it and stay reachable for control requests.
    let dir = tempfile::tempdir().unwrap();
    let mut config = SupervisorConfig::default();
    config.watch_poll_interval = std::time::Duration::ZERO;
    let supervisor = Supervisor::new(config);

    let handle = supervisor
        .start(sh(dir.path(), "steady", "sleep 5"))
        .await
        .expect("start should succeed");

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(handle.snapshot().state, ProcessState::Running);

    supervisor
        .stop("steady", None)
        .await
        .expect("stop should reach the monitor");
    assert_eq!(
        supervisor.status("steady").expect("status").state,
        ProcessState::Stopped
    );
}

// ---------------------------------------------------------------------------
// 2. Registry behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    supervisor
        .start(sh(dir.path(), "app", "sleep 5"))
        .await
        .expect("first start should succeed");

    let err = supervisor
        .start(sh(dir.path(), "app", "sleep 5"))
        .await
        .expect_err("second start should fail");
    assert!(matches!(err, SupervisorError::NameTaken(name) if name == "app"));

    // The original process is untouched.
    assert_eq!(
        supervisor.status("app").expect("status").state,
        ProcessState::Running
    );

    supervisor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn unknown_names_error() {
    let supervisor = Supervisor::default();

    assert!(matches!(
        supervisor.status("ghost"),
        Err(SupervisorError::UnknownProcess(_))
    ));
    assert!(matches!(
        supervisor.stop("ghost", None).await,
        Err(SupervisorError::UnknownProcess(_))
    ));
    assert!(matches!(
        supervisor.restart("ghost").await,
        Err(SupervisorError::UnknownProcess(_))
    ));
    assert!(supervisor.get("ghost").is_none());
}

#[tokio::test]
async fn failed_launch_registers_nothing() {
    let supervisor = Supervisor::default();

    let mut spec = ProcessSpec::new("lost", "sleep");
    spec.args = vec!["5".to_string()];
    spec.working_dir = "/definitely/not/a/real/directory".into();

    let err = supervisor.start(spec).await.expect_err("start should fail");
    assert!(matches!(
        err,
        SupervisorError::Launch(LaunchError::WorkingDir { .. })
    ));
    assert!(supervisor.names().is_empty());

    // The name is free for a corrected spec.
    let dir = tempfile::tempdir().unwrap();
    supervisor
        .start(sh(dir.path(), "lost", "sleep 5"))
        .await
        .expect("corrected start should succeed");
    supervisor.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn unopenable_log_destination_fails_start() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    let mut spec = sh(dir.path(), "blocked", "sleep 5");
    // A directory cannot be opened as an append-mode log file.
    spec.stdout_path = Some(dir.path().to_path_buf());

    let err = supervisor.start(spec).await.expect_err("start should fail");
    assert!(matches!(
        err,
        SupervisorError::Launch(LaunchError::LogOpen { .. })
    ));
    assert!(supervisor.names().is_empty());
}

#[tokio::test]
async fn names_and_snapshots_are_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    supervisor
        .start(sh(dir.path(), "bravo", "sleep 5"))
        .await
        .expect("start bravo");
    supervisor
        .start(sh(dir.path(), "alpha", "sleep 5"))
        .await
        .expect("start alpha");

    assert_eq!(supervisor.names(), vec!["alpha", "bravo"]);
    let snaps = supervisor.snapshots();
    assert_eq!(snaps.len(), 2);
    assert_eq!(snaps[0].name, "alpha");
    assert_eq!(snaps[1].name, "bravo");

    let handle = supervisor.get("alpha").expect("alpha is registered");
    assert_eq!(handle.name(), "alpha");

    supervisor.shutdown().await.expect("shutdown");
}

// ---------------------------------------------------------------------------
// 3. Merged log capture through the whole stack
// ---------------------------------------------------------------------------

#[tokio::test]
async fn merged_logs_interleave_both_streams() {
    let dir = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    let combined = logs.path().join("combined.log");
    let supervisor = Supervisor::default();

    let mut spec = sh(
        dir.path(),
        "chatty",
        "echo out-1; echo err-1 >&2; echo out-2",
    );
    spec.stdout_path = Some(combined.clone());
    spec.merge_logs = true;

    let mut handle = supervisor.start(spec).await.expect("start should succeed");
    handle
        .wait_for_state(ProcessState::Stopped)
        .await
        .expect("process should finish");

    let body = std::fs::read_to_string(&combined).expect("read combined log");
    assert_eq!(body, "out-1\nerr-1\nout-2\n");
}
