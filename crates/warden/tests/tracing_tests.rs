// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integration tests that verify structured tracing output from the
//! supervision runtime.
//!
//! Uses a capturing subscriber to collect formatted log lines, then asserts
//! on their content. Tests run on a current-thread runtime, so monitor tasks
//! emit through the thread-local test subscriber.

#![cfg(unix)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::fmt::MakeWriter;
use warden::{ProcessSpec, ProcessState, Supervisor, SupervisorConfig};

// ---------------------------------------------------------------------------
// Capturing infrastructure
// ---------------------------------------------------------------------------

/// Shared buffer that implements `io::Write` + `MakeWriter` so
/// `tracing_subscriber::fmt` can write formatted events into it.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;
    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }

    fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

/// Build a subscriber that captures all levels and returns the log buffer.
fn capturing_subscriber() -> (tracing::subscriber::DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (guard, logs)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sh(dir: &Path, name: &str, script: &str) -> ProcessSpec {
    let mut spec = ProcessSpec::new(name, "sh");
    spec.args = vec!["-c".to_string(), script.to_string()];
    spec.working_dir = dir.to_path_buf();
    spec
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn launch_and_crash_emit_monitor_events() {
    let (_guard, logs) = capturing_subscriber();
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    let mut handle = supervisor
        .start(sh(dir.path(), "crasher", "exit 1"))
        .await
        .expect("start should succeed");
    handle
        .wait_for_state(ProcessState::Crashed)
        .await
        .expect("process should crash");

    assert!(logs.contains("warden.monitor"), "logs:\n{}", logs.contents());
    assert!(logs.contains("process started"));
    assert!(logs.contains("process crashed"));
    assert!(logs.contains("crasher"));
}

#[tokio::test]
async fn stop_emits_supervisor_and_monitor_lines() {
    let (_guard, logs) = capturing_subscriber();
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    supervisor
        .start(sh(dir.path(), "sleeper", "sleep 5"))
        .await
        .expect("start should succeed");
    supervisor.stop("sleeper", None).await.expect("stop should succeed");

    assert!(logs.contains("warden.supervisor"), "logs:\n{}", logs.contents());
    assert!(logs.contains("process registered"));
    assert!(logs.contains("stop requested"));
    assert!(logs.contains("process stopped"));
}

#[tokio::test]
async fn shutdown_reaps_every_monitor_without_failures() {
    let (_guard, logs) = capturing_subscriber();
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::default();

    supervisor
        .start(sh(dir.path(), "first", "sleep 5"))
        .await
        .expect("start first");
    supervisor
        .start(sh(dir.path(), "second", "sleep 5"))
        .await
        .expect("start second");

    supervisor.shutdown().await.expect("shutdown");

    // Both monitor tasks ran to completion by the time their joins
    // resolved, and neither join nor stop reported a failure.
    assert!(logs.contains("shutting down"), "logs:\n{}", logs.contents());
    assert!(logs.contains("monitor task finished"));
    assert!(!logs.contains("did not shut down cleanly"));
    assert!(!logs.contains("monitor task did not finish cleanly"));
}

#[tokio::test]
async fn restart_loops_warn_with_the_backoff_delay() {
    let (_guard, logs) = capturing_subscriber();
    let dir = tempfile::tempdir().unwrap();

    let mut config = SupervisorConfig::default();
    config.restart.base_delay = Duration::from_millis(10);
    config.restart.max_delay = Duration::from_millis(20);
    config.restart.jitter_factor = 0.0;
    config.restart.loop_threshold = 2;
    let supervisor = Supervisor::new(config);

    let mut spec = sh(dir.path(), "looper", "exit 1");
    spec.autorestart = true;

    let mut handle = supervisor.start(spec).await.expect("start should succeed");
    handle
        .wait_for(|snap| snap.health.is_degraded())
        .await
        .expect("loop should be flagged");

    assert!(logs.contains("restart loop detected"), "logs:\n{}", logs.contents());
    assert!(logs.contains("relaunching after backoff"));
    assert!(logs.contains("delay_ms"));

    supervisor.shutdown().await.expect("shutdown");
}
