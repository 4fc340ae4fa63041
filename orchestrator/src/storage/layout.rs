//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::file::File;

/// Storage layout for the orchestrator
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the engine feature-flag file path
    pub fn feature_flags_file(&self) -> File {
        File::new(self.base_dir.join("feature_flags.json"))
    }

    /// Get the deployment history file path
    pub fn history_file(&self) -> File {
        File::new(self.base_dir.join("deployment_history.json"))
    }

    /// Get the cost ledger file path
    pub fn ledger_file(&self) -> File {
        File::new(self.base_dir.join("cost_ledger.json"))
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        // Use /etc/pipeform on Linux, or user home directory on other platforms
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/etc/pipeform");

        #[cfg(not(target_os = "linux"))]
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pipeform");

        Self::new(base_dir)
    }
}

#[cfg(not(target_os = "linux"))]
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
