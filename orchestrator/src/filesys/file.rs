//! File operations

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::errors::PipeformError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, PipeformError> {
        let mut file = fs::File::open(&self.path).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;
        Ok(contents)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, PipeformError> {
        let contents = self.read_string().await?;
        let value = serde_json::from_str(&contents)?;
        Ok(value)
    }

    /// Read file as JSON, falling back to a default when the file is absent.
    ///
    /// Parse failures on an existing file still propagate.
    pub async fn read_json_or<T: DeserializeOwned, F: FnOnce() -> T>(
        &self,
        fallback: F,
    ) -> Result<T, PipeformError> {
        if !self.exists().await {
            return Ok(fallback());
        }
        self.read_json().await
    }

    /// Write string to file
    pub async fn write_string(&self, contents: &str) -> Result<(), PipeformError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&self.path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Write JSON to file
    pub async fn write_json<T: Serialize>(&self, value: &T) -> Result<(), PipeformError> {
        let contents = serde_json::to_string_pretty(value)?;
        self.write_string(&contents).await
    }

    /// Atomic JSON write using a temporary file
    pub async fn write_json_atomic<T: Serialize>(&self, value: &T) -> Result<(), PipeformError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(value)?;
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Delete the file
    pub async fn delete(&self) -> Result<(), PipeformError> {
        if self.exists().await {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip_and_fallback() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let file = File::new(dir.path().join("nested").join("doc.json"));

            assert!(!file.exists().await);
            let fallback: Vec<String> = file.read_json_or(Vec::new).await.unwrap();
            assert!(fallback.is_empty());

            file.write_json_atomic(&vec!["a".to_string(), "b".to_string()])
                .await
                .unwrap();
            assert!(file.exists().await);

            let loaded: Vec<String> = file.read_json().await.unwrap();
            assert_eq!(loaded, vec!["a".to_string(), "b".to_string()]);

            file.delete().await.unwrap();
            assert!(!file.exists().await);
        });
    }
}
