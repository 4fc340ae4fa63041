//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Path to the transformation project driven by the engines
    #[serde(default = "default_project_path")]
    pub project_path: String,

    /// Billed compute rate in dollars per hour
    #[serde(default = "default_cost_per_hour")]
    pub cost_per_hour: f64,

    /// Subprocess call timeout in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Environments treated as production targets
    #[serde(default = "default_prod_environments")]
    pub prod_environments: Vec<String>,

    /// Allow interactive engine selection on a terminal
    #[serde(default)]
    pub allow_interactive_selection: bool,

    /// Verify engine installation before constructing an adapter
    #[serde(default)]
    pub strict_installation_check: bool,

    /// Per-engine configuration
    #[serde(default)]
    pub engines: EnginesSettings,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_project_path() -> String {
    ".".to_string()
}

fn default_cost_per_hour() -> f64 {
    2.5
}

fn default_call_timeout_ms() -> u64 {
    300_000
}

fn default_prod_environments() -> Vec<String> {
    vec!["prod".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            project_path: default_project_path(),
            cost_per_hour: default_cost_per_hour(),
            call_timeout_ms: default_call_timeout_ms(),
            prod_environments: default_prod_environments(),
            allow_interactive_selection: false,
            strict_installation_check: false,
            engines: EnginesSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Apply environment-variable overrides.
    ///
    /// `PIPEFORM_PROJECT_PATH`, `PIPEFORM_COST_PER_HOUR` and
    /// `PIPEFORM_CALL_TIMEOUT_MS` take precedence over the settings file.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("PIPEFORM_PROJECT_PATH") {
            if !path.is_empty() {
                self.project_path = path;
            }
        }
        if let Ok(rate) = std::env::var("PIPEFORM_COST_PER_HOUR") {
            if let Ok(rate) = rate.parse::<f64>() {
                self.cost_per_hour = rate;
            }
        }
        if let Ok(timeout) = std::env::var("PIPEFORM_CALL_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.call_timeout_ms = timeout;
            }
        }
        self
    }
}

/// Per-engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginesSettings {
    /// dbt-style engine
    #[serde(default = "default_dbt_engine")]
    pub dbt: EngineSettings,

    /// SQLMesh-style engine
    #[serde(default = "default_sqlmesh_engine")]
    pub sqlmesh: EngineSettings,
}

fn default_dbt_engine() -> EngineSettings {
    EngineSettings {
        enabled: true,
        executable: "dbt-bridge".to_string(),
    }
}

fn default_sqlmesh_engine() -> EngineSettings {
    EngineSettings {
        enabled: true,
        executable: "sqlmesh-bridge".to_string(),
    }
}

impl Default for EnginesSettings {
    fn default() -> Self {
        Self {
            dbt: default_dbt_engine(),
            sqlmesh: default_sqlmesh_engine(),
        }
    }
}

/// Configuration for a single transformation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Whether this engine may be selected at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bridge executable for this engine
    pub executable: String,
}

fn default_true() -> bool {
    true
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
