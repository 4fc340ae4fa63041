//! Transformation engine abstraction

pub mod bridge;
pub mod dbt;
pub mod factory;
pub mod flags;
pub mod sqlmesh;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::PipeformError;

/// Supported transformation engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Dbt,
    Sqlmesh,
}

impl EngineKind {
    /// All known engines
    pub fn all() -> [EngineKind; 2] {
        [EngineKind::Dbt, EngineKind::Sqlmesh]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Dbt => "dbt",
            EngineKind::Sqlmesh => "sqlmesh",
        }
    }

    /// Feature-flag key gating this engine
    pub fn flag_key(&self) -> String {
        format!("{}_transformations", self.as_str())
    }

    /// Parse an engine name, case-insensitively
    pub fn parse(name: &str) -> Option<EngineKind> {
        match name.trim().to_lowercase().as_str() {
            "dbt" => Some(EngineKind::Dbt),
            "sqlmesh" => Some(EngineKind::Sqlmesh),
            _ => None,
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single engine call
#[derive(Debug, Clone, Default)]
pub struct EngineResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,

    /// Backend-reported error message, when any
    pub error: Option<String>,
}

impl EngineResult {
    /// Short human-readable reason for a non-success result
    pub fn reason(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        if !self.stderr.trim().is_empty() {
            return self.stderr.trim().to_string();
        }
        if !self.stdout.trim().is_empty() {
            return self.stdout.trim().to_string();
        }
        "engine reported failure".to_string()
    }
}

/// Uniform capability contract every transformation backend implements.
///
/// Expected test/audit failures come back as `success: false`, never as an
/// `Err`; errors are reserved for spawn failures, protocol violations and
/// timeouts.
#[async_trait]
pub trait EngineAdapter: Send + Sync + std::fmt::Debug {
    /// Which backend this adapter drives
    fn kind(&self) -> EngineKind;

    /// Cheap liveness/status probe
    async fn get_status(&self) -> Result<EngineResult, PipeformError>;

    /// Run the backend's model/unit tests
    async fn test(&self, target: Option<&str>) -> Result<EngineResult, PipeformError>;

    /// Run backend-native data-quality audits
    async fn audit(&self, target: Option<&str>) -> Result<EngineResult, PipeformError>;

    /// Describe pending schema/data changes versus `environment`
    async fn diff(&self, environment: &str) -> Result<EngineResult, PipeformError>;

    /// Compute an execution plan without applying it
    async fn plan(&self, environment: &str, is_prod: bool) -> Result<EngineResult, PipeformError>;

    /// Apply the plan, atomically swapping the new state into `environment`
    async fn migrate(&self, environment: &str) -> Result<EngineResult, PipeformError>;

    /// Confirm the backend executable/runtime is present and usable
    async fn validate_installation(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parse_is_case_insensitive() {
        assert_eq!(EngineKind::parse("SQLMesh"), Some(EngineKind::Sqlmesh));
        assert_eq!(EngineKind::parse(" dbt "), Some(EngineKind::Dbt));
        assert_eq!(EngineKind::parse("spark"), None);
    }

    #[test]
    fn test_flag_key_format() {
        assert_eq!(EngineKind::Dbt.flag_key(), "dbt_transformations");
        assert_eq!(EngineKind::Sqlmesh.flag_key(), "sqlmesh_transformations");
    }

    #[test]
    fn test_result_reason_precedence() {
        let result = EngineResult {
            success: false,
            stdout: "out".to_string(),
            stderr: "bad model".to_string(),
            error: None,
        };
        assert_eq!(result.reason(), "bad model");

        let result = EngineResult::default();
        assert_eq!(result.reason(), "engine reported failure");
    }
}
