//! Subprocess bridge protocol tests
#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use pipeform::engines::bridge::{BridgeRequest, BridgeSettings, SubprocessBridge};
use pipeform::errors::PipeformError;

/// Write an executable shell script acting as a bridge
fn script_bridge(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn bridge_for(path: &PathBuf, timeout_ms: u64) -> SubprocessBridge {
    let settings = BridgeSettings::new(path.to_str().unwrap(), "/tmp/project")
        .with_call_timeout(Duration::from_millis(timeout_ms))
        .with_kill_grace(Duration::from_millis(200));
    SubprocessBridge::new(settings, true)
}

#[tokio::test]
async fn test_bridge_reads_single_json_reply() {
    let dir = tempfile::tempdir().unwrap();
    // The bridge consumes the request from stdin, then answers
    let path = script_bridge(
        &dir,
        "ok-bridge",
        r#"cat > /dev/null
echo '{"success": true, "stdout": "plan ready", "stderr": "", "returncode": 0}'"#,
    );

    let bridge = bridge_for(&path, 5_000);
    let reply = bridge
        .call(&BridgeRequest::new("plan", "/tmp/project"))
        .await
        .unwrap();

    assert!(reply.success);
    assert_eq!(reply.stdout, "plan ready");
    assert_eq!(reply.returncode, 0);
}

#[tokio::test]
async fn test_bridge_surfaces_backend_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = script_bridge(
        &dir,
        "fail-bridge",
        r#"cat > /dev/null
echo '{"success": false, "stdout": "", "stderr": "3 tests failed", "returncode": 1}'"#,
    );

    let bridge = bridge_for(&path, 5_000);
    let reply = bridge
        .call(&BridgeRequest::new("test", "/tmp/project"))
        .await
        .unwrap();

    // Expected failures come back as success=false, not as an Err
    assert!(!reply.success);
    assert_eq!(reply.stderr, "3 tests failed");
    assert_eq!(reply.returncode, 1);
}

#[tokio::test]
async fn test_bridge_rejects_non_json_reply() {
    let dir = tempfile::tempdir().unwrap();
    let path = script_bridge(
        &dir,
        "noisy-bridge",
        r#"cat > /dev/null
echo 'Usage: bridge [OPTIONS] COMMAND'"#,
    );

    let bridge = bridge_for(&path, 5_000);
    let err = bridge
        .call(&BridgeRequest::new("status", "/tmp/project"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipeformError::BridgeError(_)));
}

#[tokio::test]
async fn test_bridge_rejects_missing_reply() {
    let dir = tempfile::tempdir().unwrap();
    let path = script_bridge(&dir, "mute-bridge", "cat > /dev/null");

    let bridge = bridge_for(&path, 5_000);
    let err = bridge
        .call(&BridgeRequest::new("status", "/tmp/project"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipeformError::BridgeError(_)));
}

#[tokio::test]
async fn test_bridge_timeout_is_distinguishable() {
    let dir = tempfile::tempdir().unwrap();
    let path = script_bridge(&dir, "slow-bridge", "sleep 30");

    let bridge = bridge_for(&path, 200);
    let err = bridge
        .call(&BridgeRequest::new("migrate", "/tmp/project"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipeformError::TimeoutError(_)));
    assert!(err.to_string().contains("migrate"));
}

#[tokio::test]
async fn test_missing_executable_is_an_engine_error() {
    let settings = BridgeSettings::new("pipeform-no-such-bridge", "/tmp/project");
    let bridge = SubprocessBridge::new(settings, true);

    let err = bridge
        .call(&BridgeRequest::new("status", "/tmp/project"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipeformError::EngineError(_)));
    assert!(err.to_string().contains("spawn"));
}
