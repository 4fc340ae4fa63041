//! Subprocess bridge to a transformation backend
//!
//! Every engine call is one request/reply exchange with a backend-specific
//! bridge executable: a JSON request object on stdin, a single JSON reply on
//! stdout. All spawn, timeout and kill logic lives here so callers never
//! touch process primitives.

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::errors::PipeformError;

/// Default per-call timeout
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Grace window between the stop signal and the forced kill
pub const KILL_GRACE: Duration = Duration::from_millis(5_000);

/// Request envelope sent to the bridge executable
#[derive(Debug, Clone, Serialize)]
pub struct BridgeRequest {
    pub command: String,
    pub args: Vec<String>,
    pub options: serde_json::Value,
    pub project_path: String,
}

impl BridgeRequest {
    pub fn new(command: &str, project_path: &str) -> Self {
        Self {
            command: command.to_string(),
            args: Vec::new(),
            options: serde_json::json!({}),
            project_path: project_path.to_string(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }
}

/// Reply envelope read from the bridge executable's stdout
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeResponse {
    pub success: bool,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub returncode: i32,
}

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Bridge executable name or path
    pub executable: String,

    /// Transformation project the backend operates on
    pub project_path: String,

    /// Per-call timeout
    pub call_timeout: Duration,

    /// Grace window before the forced kill
    pub kill_grace: Duration,
}

impl BridgeSettings {
    pub fn new(executable: &str, project_path: &str) -> Self {
        Self {
            executable: executable.to_string(),
            project_path: project_path.to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            kill_grace: KILL_GRACE,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }
}

/// One subprocess bridge to a backend executable
#[derive(Debug)]
pub struct SubprocessBridge {
    settings: BridgeSettings,
    enabled: bool,
}

impl SubprocessBridge {
    /// Create a bridge; `enabled` mirrors the engine's feature flag
    pub fn new(settings: BridgeSettings, enabled: bool) -> Self {
        Self { settings, enabled }
    }

    pub fn project_path(&self) -> &str {
        &self.settings.project_path
    }

    /// Send one request and read the single JSON reply.
    ///
    /// Rejects immediately, without spawning, when the engine's feature flag
    /// is disabled. A timed-out call is reported as a distinguishable
    /// `TimeoutError`, not as backend output.
    pub async fn call(&self, request: &BridgeRequest) -> Result<BridgeResponse, PipeformError> {
        if !self.enabled {
            return Err(PipeformError::EngineError(format!(
                "engine '{}' is disabled by feature flag",
                self.settings.executable
            )));
        }

        debug!(
            "Bridge call: {} {} (project: {})",
            self.settings.executable, request.command, request.project_path
        );

        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(&self.settings.executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PipeformError::EngineError(format!(
                    "failed to spawn '{}' for command '{}': {}",
                    self.settings.executable, request.command, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A bridge may exit before draining stdin; its reply decides the
            // outcome, so a broken pipe here is not an error by itself
            let _ = stdin.write_all(&payload).await;
            // stdin drops here, signalling EOF to the bridge
        }

        let reply = match tokio::time::timeout(self.settings.call_timeout, read_reply(&mut child))
            .await
        {
            Ok(reply) => reply?,
            Err(_) => {
                self.terminate(&mut child).await;
                return Err(PipeformError::TimeoutError(format!(
                    "'{}' command '{}' exceeded {} ms",
                    self.settings.executable,
                    request.command,
                    self.settings.call_timeout.as_millis()
                )));
            }
        };

        parse_reply(&self.settings.executable, &request.command, &reply)
    }

    /// Graceful stop signal first, forced kill after the grace window
    async fn terminate(&self, child: &mut Child) {
        warn!(
            "Bridge call to '{}' timed out, stopping process",
            self.settings.executable
        );

        if self.graceful_stop(child).await {
            return;
        }
        let _ = child.kill().await;
    }

    /// Send SIGTERM and wait out the grace window; true when the process
    /// exited on its own
    #[cfg(unix)]
    async fn graceful_stop(&self, child: &mut Child) -> bool {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = child.id() else {
            return true; // already exited
        };

        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        if tokio::time::timeout(self.settings.kill_grace, child.wait())
            .await
            .is_ok()
        {
            return true;
        }

        warn!(
            "'{}' ignored stop signal, killing",
            self.settings.executable
        );
        false
    }

    #[cfg(not(unix))]
    async fn graceful_stop(&self, _child: &mut Child) -> bool {
        false
    }
}

/// Drain stdout and wait for the process to exit
async fn read_reply(child: &mut Child) -> Result<Vec<u8>, PipeformError> {
    use tokio::io::AsyncReadExt;

    let mut stdout = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        out.read_to_end(&mut stdout).await?;
    }
    child.wait().await?;
    Ok(stdout)
}

/// Parse the single JSON reply; anything else is a protocol error
fn parse_reply(
    executable: &str,
    command: &str,
    raw: &[u8],
) -> Result<BridgeResponse, PipeformError> {
    if raw.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(PipeformError::BridgeError(format!(
            "'{}' command '{}' produced no reply",
            executable, command
        )));
    }

    serde_json::from_slice(raw).map_err(|e| {
        PipeformError::BridgeError(format!(
            "'{}' command '{}' returned a non-JSON reply: {}",
            executable, command, e
        ))
    })
}
