//! Deployment history store

use tokio::sync::Mutex;

use crate::errors::PipeformError;
use crate::filesys::file::File;
use crate::models::deployment::Deployment;

/// Append-only store of terminal deployment records
pub struct DeploymentHistory {
    file: File,
    write_lock: Mutex<()>,
}

impl DeploymentHistory {
    /// Create a history store backed by a JSON file
    pub fn new(file: File) -> Self {
        Self {
            file,
            write_lock: Mutex::new(()),
        }
    }

    /// Append a terminal deployment record
    pub async fn append(&self, deployment: &Deployment) -> Result<(), PipeformError> {
        let _guard = self.write_lock.lock().await;

        let mut records: Vec<Deployment> = self.file.read_json_or(Vec::new).await?;
        records.push(deployment.clone());
        self.file.write_json_atomic(&records).await
    }

    /// Return the most recent `limit` deployments, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<Deployment>, PipeformError> {
        let records: Vec<Deployment> = self.file.read_json_or(Vec::new).await?;
        Ok(records.into_iter().rev().take(limit).collect())
    }
}
