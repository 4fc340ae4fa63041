//! SQLMesh engine adapter

use async_trait::async_trait;

use crate::engines::bridge::{BridgeRequest, BridgeResponse, SubprocessBridge};
use crate::engines::{EngineAdapter, EngineKind, EngineResult};
use crate::errors::PipeformError;

/// Adapter driving a SQLMesh-style backend through its bridge executable.
///
/// SQLMesh plans materialize into virtual data environments, so `plan` is
/// cheap relative to `migrate`, which promotes the computed snapshot.
#[derive(Debug)]
pub struct SqlmeshEngine {
    bridge: SubprocessBridge,
}

impl SqlmeshEngine {
    pub fn new(bridge: SubprocessBridge) -> Self {
        Self { bridge }
    }

    fn request(&self, command: &str) -> BridgeRequest {
        BridgeRequest::new(command, self.bridge.project_path())
    }

    async fn call(&self, request: BridgeRequest) -> Result<EngineResult, PipeformError> {
        let reply = self.bridge.call(&request).await?;
        Ok(into_result(reply))
    }
}

fn into_result(reply: BridgeResponse) -> EngineResult {
    let error = if reply.success {
        None
    } else if !reply.stderr.trim().is_empty() {
        Some(reply.stderr.trim().to_string())
    } else {
        Some(format!("sqlmesh exited with code {}", reply.returncode))
    };
    EngineResult {
        success: reply.success,
        stdout: reply.stdout,
        stderr: reply.stderr,
        error,
    }
}

#[async_trait]
impl EngineAdapter for SqlmeshEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Sqlmesh
    }

    async fn get_status(&self) -> Result<EngineResult, PipeformError> {
        self.call(self.request("info")).await
    }

    async fn test(&self, target: Option<&str>) -> Result<EngineResult, PipeformError> {
        let mut request = self.request("test");
        if let Some(model) = target {
            request = request.with_args(vec!["--model".to_string(), model.to_string()]);
        }
        self.call(request).await
    }

    async fn audit(&self, target: Option<&str>) -> Result<EngineResult, PipeformError> {
        let mut request = self.request("audit");
        if let Some(model) = target {
            request = request.with_args(vec!["--model".to_string(), model.to_string()]);
        }
        self.call(request).await
    }

    async fn diff(&self, environment: &str) -> Result<EngineResult, PipeformError> {
        let request = self
            .request("table-diff")
            .with_args(vec!["--environment".to_string(), environment.to_string()]);
        self.call(request).await
    }

    async fn plan(&self, environment: &str, is_prod: bool) -> Result<EngineResult, PipeformError> {
        let request = self
            .request("plan")
            .with_args(vec!["--environment".to_string(), environment.to_string()])
            .with_options(serde_json::json!({
                "auto_apply": false,
                "no_prompts": true,
                "is_prod": is_prod,
            }));
        self.call(request).await
    }

    async fn migrate(&self, environment: &str) -> Result<EngineResult, PipeformError> {
        let request = self
            .request("plan")
            .with_args(vec!["--environment".to_string(), environment.to_string()])
            .with_options(serde_json::json!({
                "auto_apply": true,
                "no_prompts": true,
            }));
        self.call(request).await
    }

    async fn validate_installation(&self) -> bool {
        match self.bridge.call(&self.request("validate")).await {
            Ok(reply) => reply.success,
            Err(_) => false,
        }
    }
}
