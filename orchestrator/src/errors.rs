//! Error types for the Pipeform orchestrator

use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum PipeformError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("Engine bridge protocol error: {0}")]
    BridgeError(String),

    #[error("Engine call timed out: {0}")]
    TimeoutError(String),

    #[error("Engine selection error: {0}")]
    SelectionError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Deployment error: {0}")]
    DeployError(String),

    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for PipeformError {
    fn from(err: anyhow::Error) -> Self {
        PipeformError::Internal(err.to_string())
    }
}
