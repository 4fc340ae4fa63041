//! dbt engine adapter

use async_trait::async_trait;

use crate::engines::bridge::{BridgeRequest, BridgeResponse, SubprocessBridge};
use crate::engines::{EngineAdapter, EngineKind, EngineResult};
use crate::errors::PipeformError;

/// Adapter driving a dbt-style backend through its bridge executable
#[derive(Debug)]
pub struct DbtEngine {
    bridge: SubprocessBridge,
}

impl DbtEngine {
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
    } else {
        Some(format!("dbt exited with code {}", reply.returncode))
    };
    EngineResult {
        success: reply.success,
        stdout: reply.stdout,
        stderr: reply.stderr,
        error,
    }
}

#[async_trait]
impl EngineAdapter for DbtEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Dbt
    }

    async fn get_status(&self) -> Result<EngineResult, PipeformError> {
        self.call(self.request("debug")).await
    }

    async fn test(&self, target: Option<&str>) -> Result<EngineResult, PipeformError> {
        let mut request = self.request("test");
        if let Some(selector) = target {
            request = request.with_args(vec!["--select".to_string(), selector.to_string()]);
        }
        self.call(request).await
    }

    async fn audit(&self, target: Option<&str>) -> Result<EngineResult, PipeformError> {
        // dbt models data-quality audits as source freshness checks
        let mut request = self.request("source-freshness");
        if let Some(selector) = target {
            request = request.with_args(vec!["--select".to_string(), selector.to_string()]);
        }
        self.call(request).await
    }

    async fn diff(&self, environment: &str) -> Result<EngineResult, PipeformError> {
        let request = self
            .request("diff")
            .with_args(vec!["--target".to_string(), environment.to_string()]);
        self.call(request).await
    }

    async fn plan(&self, environment: &str, is_prod: bool) -> Result<EngineResult, PipeformError> {
        let request = self
            .request("run")
            .with_args(vec!["--target".to_string(), environment.to_string()])
            .with_options(serde_json::json!({
                "dry_run": true,
                "full_refresh": false,
                "is_prod": is_prod,
            }));
        self.call(request).await
    }

    async fn migrate(&self, environment: &str) -> Result<EngineResult, PipeformError> {
        let request = self
            .request("run")
            .with_args(vec!["--target".to_string(), environment.to_string()])
            .with_options(serde_json::json!({ "dry_run": false }));
        self.call(request).await
    }

    async fn validate_installation(&self) -> bool {
        match self.bridge.call(&self.request("validate")).await {
            Ok(reply) => reply.success,
            Err(_) => false,
        }
    }
}
